use crextables::Fxy;

/// A descriptor code classified once by its `F` part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor {
    /// `F = 0`: a Table B element, decodes one value.
    Element(Fxy),
    /// `F = 1`: repeat the next `group_size` descriptors `count` times.
    /// A zero count means the count is read from the data (delayed).
    Replication { group_size: usize, count: usize },
    /// `F = 2`: operator descriptor.
    Modifier { operator: u8, operand: u16 },
    /// `F = 3`: a Table D sequence.
    Sequence(Fxy),
}

impl Descriptor {
    pub fn is_delayed_replication(&self) -> bool {
        matches!(self, Descriptor::Replication { count: 0, .. })
    }
}

impl From<Fxy> for Descriptor {
    fn from(fxy: Fxy) -> Self {
        match fxy.f() {
            0 => Descriptor::Element(fxy),
            1 => Descriptor::Replication {
                group_size: fxy.x() as usize,
                count: fxy.y() as usize,
            },
            2 => Descriptor::Modifier {
                operator: fxy.x(),
                operand: fxy.y(),
            },
            _ => Descriptor::Sequence(fxy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_f() {
        assert_eq!(
            Descriptor::from(Fxy::new(0, 12, 101)),
            Descriptor::Element(Fxy::new(0, 12, 101))
        );
        assert_eq!(
            Descriptor::from(Fxy::new(1, 3, 12)),
            Descriptor::Replication {
                group_size: 3,
                count: 12
            }
        );
        assert!(Descriptor::from(Fxy::new(1, 2, 0)).is_delayed_replication());
        assert_eq!(
            Descriptor::from(Fxy::new(2, 1, 129)),
            Descriptor::Modifier {
                operator: 1,
                operand: 129
            }
        );
        assert_eq!(
            Descriptor::from(Fxy::new(3, 1, 11)),
            Descriptor::Sequence(Fxy::new(3, 1, 11))
        );
    }
}
