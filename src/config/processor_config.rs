use serde::{Deserialize, Serialize};

// External command invoked once per job; the payload is appended to `args`
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProcessorConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
        }
    }
}

fn default_program() -> String {
    "echo".to_string()
}
