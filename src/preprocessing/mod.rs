//! Feature preparation

mod scaler;

pub use scaler::StandardScaler;
