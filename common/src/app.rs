use crate::shuffle::KeyValue;
use crate::{indexer, wordcount};

/// Función map: (nombre del split, contenido) -> pares.
pub type MapFn = fn(&str, &str) -> Vec<KeyValue>;

/// Función reduce: (clave, todos sus valores) -> resultado.
pub type ReduceFn = fn(&str, &[String]) -> String;

/// Par de funciones map/reduce que ejecuta un worker.
#[derive(Clone, Copy)]
pub struct App {
    pub name: &'static str,
    pub map: MapFn,
    pub reduce: ReduceFn,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").field("name", &self.name).finish()
    }
}

const APPS: &[App] = &[
    App {
        name: "wordcount",
        map: wordcount::map,
        reduce: wordcount::reduce,
    },
    App {
        name: "indexer",
        map: indexer::map,
        reduce: indexer::reduce,
    },
];

/// Busca una aplicación por nombre (`--app` / `MR_APP`).
pub fn lookup(name: &str) -> Option<App> {
    APPS.iter().find(|a| a.name == name).copied()
}

pub fn available() -> Vec<&'static str> {
    APPS.iter().map(|a| a.name).collect()
}
