use crate::errors::{Error, Result};
use crextables::Fxy;
use nom::IResult;
use nom::bits::complete::take;
use std::ops::{AddAssign, Shl, Shr};

type BitInput<'a> = (&'a [u8], usize);

fn parse_arbitrary_bits<T: From<u8> + AddAssign + Shl<usize, Output = T> + Shr<usize, Output = T>>(
    input: BitInput,
    count: usize,
) -> IResult<BitInput, T> {
    take(count)(input)
}

/// Section 3 descriptors: 16 bits each, `F` 2 bits, `X` 6 bits, `Y` 8 bits.
/// A trailing odd byte is padding.
pub(super) fn parse_descriptors(input: &[u8], offset: usize) -> Result<Vec<Fxy>> {
    parse_descriptors_inner(input)
        .map(|(_, v)| v)
        .map_err(|_| Error::framing(offset, "cannot parse section 3 descriptors"))
}

fn parse_descriptors_inner(mut input: &[u8]) -> IResult<BitInput<'_>, Vec<Fxy>> {
    let mut results = Vec::with_capacity(input.len() / 2);
    while input.len() > 1 {
        let ((rest, _), fxy) = take_fxy((input, 0))?;
        results.push(fxy);
        input = rest;
    }

    Ok(((input, 0), results))
}

fn take_fxy(bit_input: BitInput) -> IResult<BitInput, Fxy> {
    let (bit_input, f) = parse_arbitrary_bits::<u8>(bit_input, 2)?;
    let (bit_input, x) = parse_arbitrary_bits::<u8>(bit_input, 6)?;
    let (bit_input, y) = parse_arbitrary_bits::<u16>(bit_input, 8)?;

    Ok((bit_input, Fxy::new(f, x, y)))
}
