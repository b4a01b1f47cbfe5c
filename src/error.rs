use thiserror::Error;

/// Result type used throughout the model.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Everything that can go wrong while running the model, tagged by stage.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("generation: zone {zone} ({name}) has no row in the {table} table")]
    DataJoin {
        zone: u32,
        name: String,
        table: String,
    },
    #[error("generation: zone identifier {0} appears more than once")]
    DuplicateZone(u32),
    #[error("generation: no zones left after joining supply and demand")]
    EmptyZoneTable,
    #[error("margins cannot be balanced (production total {production}, attraction total {attraction})")]
    UnbalancedMargins { production: f64, attraction: f64 },
    #[error("distribution: IPF did not converge after {iterations} iterations (residual {residual:e})")]
    Convergence { iterations: usize, residual: f64 },
    #[error("mode choice: scenario `{scenario}` has degenerate utilities for zones {origin} -> {destination}")]
    DegenerateScenario {
        scenario: String,
        origin: u32,
        destination: u32,
    },
    #[error("assignment: no path from zone {origin} to zone {destination}")]
    NoPath { origin: u32, destination: u32 },
    #[error("matrix shape: {0}")]
    Shape(String),
    #[error("geometry: {0}")]
    Geometry(String),
    #[error("config: {0}")]
    Config(String),
    #[error("failed to parse {field}: `{value}`")]
    Parse { field: String, value: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
