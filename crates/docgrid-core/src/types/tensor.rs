/// Dense tensor value
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    /// Type spec, e.g. `tensor(x[3])`
    pub spec: String,
    /// Cell values in row-major order
    pub cells: Vec<f64>,
}

impl Tensor {
    /// Create a tensor
    pub fn new(spec: impl Into<String>, cells: Vec<f64>) -> Self {
        Self { spec: spec.into(), cells }
    }
}
