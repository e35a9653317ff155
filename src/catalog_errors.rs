use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("please specify an input cosmology to use in the tracer catalog")]
    MissingCosmology,

    #[error("please specify `fsky` to compute the volume needed for `nbar`")]
    MissingFsky,

    #[error("if `compute_fkp_weights` is set, please specify a value for `P0_fkp`")]
    MissingP0Fkp,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("set the active source to `data` or `randoms` by calling `set_active_source`")]
    SourceNotSet,

    #[error("'source' must be set to either `data` or `randoms`, got `{0}`")]
    InvalidSource(String),

    #[error("valid `columns` to read from TracerCatalog: {valid:?} (requested {requested:?})")]
    InvalidColumns {
        requested: Vec<String>,
        valid: Vec<String>,
    },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("'{0}' file for reading nbar does not exist")]
    NbarFileNotFound(String),

    #[error("Error during the nbar file parsing: {0}")]
    NbarParsingError(String),

    #[error("Cosmology evaluation failed: {0}")]
    Cosmology(String),

    #[error("Upstream source failed: {0}")]
    Source(String),

    #[error("Cannot estimate a number density from an empty redshift sample")]
    EmptySample,

    #[error("Invalid spline knots: {0}")]
    InvalidSpline(String),

    #[error("Collective communication failed: {0}")]
    Communication(String),
}

impl CatalogError {
    pub fn invalid_columns<S: AsRef<str>>(requested: &[S], valid: &[&str]) -> Self {
        CatalogError::InvalidColumns {
            requested: requested.iter().map(|c| c.as_ref().to_string()).collect(),
            valid: valid.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl PartialEq for CatalogError {
    fn eq(&self, other: &Self) -> bool {
        use CatalogError::*;
        match (self, other) {
            (InvalidConfig(a), InvalidConfig(b)) => a == b,
            (InvalidSource(a), InvalidSource(b)) => a == b,
            (
                InvalidColumns {
                    requested: ra,
                    valid: va,
                },
                InvalidColumns {
                    requested: rb,
                    valid: vb,
                },
            ) => ra == rb && va == vb,

            // io errors carry no comparable payload
            (IoError(_), IoError(_)) => true,

            (NbarFileNotFound(a), NbarFileNotFound(b)) => a == b,
            (NbarParsingError(a), NbarParsingError(b)) => a == b,
            (Cosmology(a), Cosmology(b)) => a == b,
            (Source(a), Source(b)) => a == b,
            (InvalidSpline(a), InvalidSpline(b)) => a == b,
            (Communication(a), Communication(b)) => a == b,

            (MissingCosmology, MissingCosmology) => true,
            (MissingFsky, MissingFsky) => true,
            (MissingP0Fkp, MissingP0Fkp) => true,
            (SourceNotSet, SourceNotSet) => true,
            (EmptySample, EmptySample) => true,

            _ => false,
        }
    }
}
