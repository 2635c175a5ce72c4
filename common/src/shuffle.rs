// common/src/shuffle.rs
//
// Archivos entre map y reduce:
// - map m publica mr-int-<m>-<p>.jsonl para TODAS las particiones p (vacías incluidas)
// - reduce p lee mr-int-*-<p>.jsonl, publica mr-out-<p> y borra lo consumido
// Toda publicación es temporal + rename en el mismo directorio.

use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::task::{MapTaskId, PartitionIndex};

const INTERMEDIATE_PREFIX: &str = "mr-int-";
const INTERMEDIATE_SUFFIX: &str = ".jsonl";
const OUTPUT_PREFIX: &str = "mr-out-";
const TEMP_PREFIX: &str = ".mr-tmp-";

/// Par clave/valor que emite una función map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// FNV-1a de 32 bits sin el bit de signo.
/// Tiene que dar lo mismo en todos los procesos worker, por eso no usamos
/// `DefaultHasher`.
pub fn ihash(key: &str) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for b in key.as_bytes() {
        h ^= u32::from(*b);
        h = h.wrapping_mul(0x0100_0193);
    }
    h & 0x7fff_ffff
}

pub fn partition_for(key: &str, reduce_count: u32) -> PartitionIndex {
    ihash(key) % reduce_count.max(1)
}

pub fn intermediate_file_name(map_id: MapTaskId, partition: PartitionIndex) -> String {
    format!("{INTERMEDIATE_PREFIX}{map_id}-{partition}{INTERMEDIATE_SUFFIX}")
}

pub fn output_file_name(partition: PartitionIndex) -> String {
    format!("{OUTPUT_PREFIX}{partition}")
}

/// Inversa de `intermediate_file_name`.
pub fn parse_intermediate_file_name(name: &str) -> Option<(MapTaskId, PartitionIndex)> {
    let rest = name
        .strip_prefix(INTERMEDIATE_PREFIX)?
        .strip_suffix(INTERMEDIATE_SUFFIX)?;
    let (map_id, partition) = rest.split_once('-')?;
    Some((map_id.parse().ok()?, partition.parse().ok()?))
}

/// Inversa de `output_file_name`.
pub fn parse_output_file_name(name: &str) -> Option<PartitionIndex> {
    name.strip_prefix(OUTPUT_PREFIX)?.parse().ok()
}

/// Reparte los pares en `reduce_count` grupos según el hash de la clave.
pub fn partition_pairs(pairs: Vec<KeyValue>, reduce_count: u32) -> Vec<Vec<KeyValue>> {
    let n = reduce_count.max(1);
    let mut groups: Vec<Vec<KeyValue>> = (0..n).map(|_| Vec::new()).collect();
    for kv in pairs {
        let pid = partition_for(&kv.key, n) as usize;
        groups[pid].push(kv);
    }
    groups
}

/// Escribe a un temporal en `dir` y lo renombra a `dir/file_name`.
fn publish_atomically<F>(dir: &Path, file_name: &str, write: F) -> io::Result<PathBuf>
where
    F: FnOnce(&mut BufWriter<&File>) -> io::Result<()>,
{
    fs::create_dir_all(dir)?;

    let tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    let final_path = dir.join(file_name);
    tmp.persist(&final_path).map_err(|e| e.error)?;
    Ok(final_path)
}

/// Salida de una tarea map: un archivo JSONL por partición, aunque quede
/// vacío, para que el reduce sepa que vio a todas las tareas map.
/// Devuelve las rutas publicadas.
pub fn write_intermediate(
    dir: &Path,
    map_id: MapTaskId,
    pairs: Vec<KeyValue>,
    reduce_count: u32,
) -> io::Result<Vec<PathBuf>> {
    let mut published = Vec::new();

    for (pid, group) in partition_pairs(pairs, reduce_count).into_iter().enumerate() {
        let name = intermediate_file_name(map_id, pid as PartitionIndex);
        let path = publish_atomically(dir, &name, |w| {
            for kv in &group {
                serde_json::to_writer(&mut *w, kv)?;
                w.write_all(b"\n")?;
            }
            Ok(())
        })?;
        debug!("publicado {} ({} pares)", path.display(), group.len());
        published.push(path);
    }

    Ok(published)
}

/// Busca los intermedios de una partición, de todas las tareas map.
/// Ordenados por id de map para que el reduce sea determinista.
pub fn find_intermediate(
    dir: &Path,
    partition: PartitionIndex,
) -> io::Result<Vec<(MapTaskId, PathBuf)>> {
    let dir_str = dir.to_string_lossy();
    let pattern = format!(
        "{}/{INTERMEDIATE_PREFIX}*-{partition}{INTERMEDIATE_SUFFIX}",
        glob::Pattern::escape(&dir_str)
    );

    let entries = glob::glob(&pattern)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut found: Vec<(MapTaskId, PathBuf)> = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| e.into_error())?;
        let parsed = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_intermediate_file_name);
        if let Some((map_id, p)) = parsed {
            if p == partition && path.is_file() {
                found.push((map_id, path));
            }
        }
    }

    found.sort_by_key(|(map_id, _)| *map_id);
    Ok(found)
}

/// Lee un archivo intermedio (un `KeyValue` JSON por línea).
pub fn read_intermediate(path: &Path) -> io::Result<Vec<KeyValue>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let kv: KeyValue = serde_json::from_str(&line)?;
        out.push(kv);
    }

    Ok(out)
}

/// Ordena por clave y agrupa los valores de cada clave.
/// El orden de los valores dentro de una clave se conserva.
pub fn group_by_key(mut pairs: Vec<KeyValue>) -> Vec<(String, Vec<String>)> {
    pairs.sort_by(|a, b| a.key.cmp(&b.key));

    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for kv in pairs {
        match grouped.last_mut() {
            Some((key, values)) if *key == kv.key => values.push(kv.value),
            _ => grouped.push((kv.key, vec![kv.value])),
        }
    }
    grouped
}

/// Publica `mr-out-<p>` con una línea "<clave> <resultado>" por clave.
/// `results` ya viene ordenado por clave.
pub fn write_output(
    dir: &Path,
    partition: PartitionIndex,
    results: &[(String, String)],
) -> io::Result<PathBuf> {
    publish_atomically(dir, &output_file_name(partition), |w| {
        for (key, value) in results {
            writeln!(w, "{} {}", key, value)?;
        }
        Ok(())
    })
}

/// Borra intermedios ya consumidos. Si otro intento del mismo reduce ya los
/// borró, no es un error.
pub fn remove_intermediate(paths: &[PathBuf]) -> io::Result<()> {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Lista los `mr-out-<p>` publicados en `dir`, ordenados por partición.
pub fn list_outputs(dir: &Path) -> io::Result<Vec<String>> {
    let mut files: Vec<(PartitionIndex, String)> = Vec::new();

    for entry in fs::read_dir(dir)?.flatten() {
        if let Ok(ft) = entry.file_type() {
            if !ft.is_file() {
                continue;
            }
        }
        if let Some(name) = entry.file_name().to_str() {
            if let Some(p) = parse_output_file_name(name) {
                files.push((p, name.to_string()));
            }
        }
    }

    files.sort();
    Ok(files.into_iter().map(|(_, n)| n).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("shuffle_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    fn names_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn ihash_is_fnv1a_without_sign_bit() {
        assert_eq!(ihash(""), 0x811c_9dc5 & 0x7fff_ffff);
        assert_eq!(ihash("a"), 0xe40c_292c & 0x7fff_ffff);
    }

    #[test]
    fn partition_for_stays_in_range() {
        for key in ["a", "b", "c", "xyz", "otro", ""] {
            assert!(partition_for(key, 7) < 7);
        }
        // N=0 se trata como una sola partición
        assert_eq!(partition_for("a", 0), 0);
    }

    #[test]
    fn intermediate_and_output_names_do_not_collide() {
        let inter = intermediate_file_name(1, 2);
        let out = output_file_name(1);
        assert_eq!(inter, "mr-int-1-2.jsonl");
        assert_eq!(out, "mr-out-1");

        assert_eq!(parse_intermediate_file_name(&inter), Some((1, 2)));
        assert_eq!(parse_intermediate_file_name(&out), None);
        assert_eq!(parse_output_file_name(&inter), None);
        assert_eq!(parse_output_file_name("mr-out-x"), None);
    }

    #[test]
    fn partition_pairs_routes_same_key_to_same_group() {
        let pairs = vec![
            KeyValue::new("a", "1"),
            KeyValue::new("b", "1"),
            KeyValue::new("a", "1"),
        ];
        let groups = partition_pairs(pairs, 3);
        assert_eq!(groups.len(), 3);

        let pa = partition_for("a", 3) as usize;
        assert_eq!(groups[pa].iter().filter(|kv| kv.key == "a").count(), 2);
        assert_eq!(groups.iter().map(|g| g.len()).sum::<usize>(), 3);
    }

    #[test]
    fn write_intermediate_publishes_every_partition() {
        let tmp = temp_dir("write_intermediate");

        let pairs = vec![KeyValue::new("solo", "1"), KeyValue::new("solo", "1")];
        let paths = write_intermediate(&tmp, 4, pairs, 5).unwrap();

        assert_eq!(paths.len(), 5);
        let mut expected: Vec<String> = (0..5).map(|p| intermediate_file_name(4, p)).collect();
        expected.sort();
        assert_eq!(names_in(&tmp), expected);

        let p = partition_for("solo", 5);
        for (pid, path) in paths.iter().enumerate() {
            let back = read_intermediate(path).unwrap();
            if pid as u32 == p {
                assert_eq!(back, vec![KeyValue::new("solo", "1"), KeyValue::new("solo", "1")]);
            } else {
                assert!(back.is_empty());
            }
        }
    }

    #[test]
    fn republishing_same_map_task_leaves_one_complete_file() {
        let tmp = temp_dir("republish");

        write_intermediate(&tmp, 0, vec![KeyValue::new("k", "primero")], 1).unwrap();
        write_intermediate(&tmp, 0, vec![KeyValue::new("k", "segundo")], 1).unwrap();

        // sin temporales colgando
        assert_eq!(names_in(&tmp), vec!["mr-int-0-0.jsonl".to_string()]);
        let back = read_intermediate(&tmp.join("mr-int-0-0.jsonl")).unwrap();
        assert_eq!(back, vec![KeyValue::new("k", "segundo")]);
    }

    #[test]
    fn find_intermediate_filters_by_partition_and_orders_by_map_id() {
        let tmp = temp_dir("find");

        for name in [
            "mr-int-10-1.jsonl",
            "mr-int-2-1.jsonl",
            "mr-int-2-11.jsonl",
            "mr-int-3-0.jsonl",
            "mr-out-1",
            "mr-int-x-1.jsonl",
        ] {
            fs::write(tmp.join(name), "").unwrap();
        }

        let found: Vec<(u32, String)> = find_intermediate(&tmp, 1)
            .unwrap()
            .iter()
            .map(|(m, p)| (*m, p.file_name().unwrap().to_string_lossy().to_string()))
            .collect();

        assert_eq!(
            found,
            vec![
                (2, "mr-int-2-1.jsonl".to_string()),
                (10, "mr-int-10-1.jsonl".to_string())
            ]
        );
    }

    #[test]
    fn read_intermediate_rejects_garbage() {
        let tmp = temp_dir("garbage");
        let path = tmp.join("mr-int-0-0.jsonl");
        fs::write(&path, "{\"key\":\"a\",\"value\":\"1\"}\nno es json\n").unwrap();

        assert!(read_intermediate(&path).is_err());
    }

    #[test]
    fn group_by_key_sorts_and_merges() {
        let grouped = group_by_key(vec![
            KeyValue::new("b", "1"),
            KeyValue::new("a", "x"),
            KeyValue::new("b", "2"),
            KeyValue::new("a", "y"),
        ]);

        assert_eq!(
            grouped,
            vec![
                ("a".to_string(), vec!["x".to_string(), "y".to_string()]),
                ("b".to_string(), vec!["1".to_string(), "2".to_string()]),
            ]
        );
        assert!(group_by_key(Vec::new()).is_empty());
    }

    #[test]
    fn write_output_uses_space_separated_lines() {
        let tmp = temp_dir("output");
        let results = vec![
            ("a".to_string(), "2".to_string()),
            ("b".to_string(), "1".to_string()),
        ];

        let path = write_output(&tmp, 3, &results).unwrap();

        assert_eq!(path, tmp.join("mr-out-3"));
        assert_eq!(fs::read_to_string(path).unwrap(), "a 2\nb 1\n");
        assert_eq!(list_outputs(&tmp).unwrap(), vec!["mr-out-3".to_string()]);
    }

    #[test]
    fn remove_intermediate_tolerates_missing_files() {
        let tmp = temp_dir("remove");
        let path = tmp.join("mr-int-0-0.jsonl");
        fs::write(&path, "").unwrap();

        let paths = vec![path.clone(), tmp.join("mr-int-9-0.jsonl")];
        remove_intermediate(&paths).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn list_outputs_orders_by_partition() {
        let tmp = temp_dir("list");
        for name in ["mr-out-10", "mr-out-2", "mr-int-0-2.jsonl", "notas.txt"] {
            fs::write(tmp.join(name), "").unwrap();
        }

        assert_eq!(
            list_outputs(&tmp).unwrap(),
            vec!["mr-out-2".to_string(), "mr-out-10".to_string()]
        );
    }
}
