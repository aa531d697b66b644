use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Shader source failed to compile or is missing an entry point.
    ShaderCompilation { label: String, details: String },
    /// A handle was used that the device does not know about.
    UnknownResource { kind: &'static str, id: u32 },
    InvalidDescriptor(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ShaderCompilation { label, details } => {
                write!(f, "Shader compilation failed for '{}': {}", label, details)
            }
            RenderError::UnknownResource { kind, id } => {
                write!(f, "Unknown {} handle {}", kind, id)
            }
            RenderError::InvalidDescriptor(e) => write!(f, "Invalid descriptor: {}", e),
        }
    }
}

impl std::error::Error for RenderError {}
