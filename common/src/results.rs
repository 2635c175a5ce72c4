use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResults {
    /// Directorio donde quedan los `mr-out-<p>`
    pub output_dir: String,
    /// Nombres de archivos de salida ya publicados, ordenados
    pub files: Vec<String>,
}
