use nom::{
    branch::alt,
    character::complete::{space0, space1},
    combinator::eof,
    number::complete::double,
    sequence::preceded,
    IResult, Parser,
};

use crate::{
    catalog_errors::CatalogError,
    constants::{Density, Redshift},
};

/// Two leading numbers, then either the end of the line or more whitespace-separated columns.
fn parse_row(input: &str) -> IResult<&str, (Redshift, Density)> {
    (
        preceded(space0, double),
        preceded(space1, double),
        alt((space1, eof)),
    )
        .map(|(z, nbar, _)| (z, nbar))
        .parse(input)
}

/// Parse the `(z, nbar)` rows of an nbar table.
///
/// Extra whitespace-separated columns are ignored, only the first two are read. A second
/// number glued to other text (`3e-4xyz`, `3e-4,1`) is an error.
pub(super) fn parse_nbar_table(content: &str) -> Result<Vec<(Redshift, Density)>, CatalogError> {
    let rows = content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(|line| {
            parse_row(line)
                .map(|(_, row)| row)
                .map_err(|_| CatalogError::NbarParsingError(line.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Err(CatalogError::NbarParsingError(
            "no (z, nbar) rows found".to_string(),
        ));
    }
    Ok(rows)
}
