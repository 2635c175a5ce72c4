// worker/src/executor.rs
// Todo bloqueante: el loop del worker lo corre con spawn_blocking.

use std::{
    collections::BTreeSet,
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use common::{shuffle, App, MapTaskId, PartitionIndex};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Executor {
    app: App,
    intermediate_dir: PathBuf,
    output_dir: PathBuf,
}

impl Executor {
    pub fn new(app: App, intermediate_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            app,
            intermediate_dir: intermediate_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn intermediate_dir(&self) -> &Path {
        &self.intermediate_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Map: lee el split, aplica la función map y publica un intermedio por
    /// partición no vacía. Devuelve la cantidad de pares emitidos.
    pub fn execute_map(
        &self,
        task_id: MapTaskId,
        input_split: &str,
        reduce_count: u32,
    ) -> Result<usize> {
        let contents = fs::read_to_string(input_split)
            .with_context(|| format!("no se pudo leer el split {input_split}"))?;

        let pairs = (self.app.map)(input_split, &contents);
        let emitted = pairs.len();

        let published =
            shuffle::write_intermediate(&self.intermediate_dir, task_id, pairs, reduce_count)
                .with_context(|| {
                    format!(
                        "no se pudieron publicar los intermedios de map {} en {}",
                        task_id,
                        self.intermediate_dir.display()
                    )
                })?;

        info!(
            "map {} ({}): {} pares en {} particiones",
            task_id,
            input_split,
            emitted,
            published.len()
        );
        Ok(emitted)
    }

    /// Reduce: junta los intermedios de la partición (uno por cada una de las
    /// `map_count` tareas map), agrupa por clave, aplica la función reduce,
    /// publica `mr-out-<p>` y borra lo consumido.
    /// Devuelve la cantidad de claves escritas.
    pub fn execute_reduce(&self, partition: PartitionIndex, map_count: u32) -> Result<usize> {
        let found = shuffle::find_intermediate(&self.intermediate_dir, partition)
            .with_context(|| format!("no se pudieron listar intermedios de la partición {partition}"))?;

        let mut inputs = Vec::with_capacity(found.len());
        let mut seen = BTreeSet::new();
        let mut pairs = Vec::new();
        for (map_id, path) in found {
            if map_id >= map_count {
                debug!("reduce {}: ignoro {} (map fuera de rango)", partition, path.display());
                continue;
            }
            match shuffle::read_intermediate(&path) {
                Ok(mut kvs) => {
                    pairs.append(&mut kvs);
                    seen.insert(map_id);
                    inputs.push(path);
                }
                // otro intento ya lo consumió y lo borró
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("no se pudo leer {}", path.display()))
                }
            }
        }

        if seen.len() < map_count as usize {
            return self.keep_committed_output(partition, &inputs, seen.len(), map_count);
        }

        let results: Vec<(String, String)> = shuffle::group_by_key(pairs)
            .into_iter()
            .map(|(key, values)| {
                let out = (self.app.reduce)(&key, &values);
                (key, out)
            })
            .collect();

        let written = shuffle::write_output(&self.output_dir, partition, &results)
            .with_context(|| format!("no se pudo publicar la salida de la partición {partition}"))?;

        shuffle::remove_intermediate(&inputs)
            .with_context(|| format!("no se pudieron borrar intermedios de la partición {partition}"))?;

        info!(
            "reduce {}: {} claves de {} intermedios -> {}",
            partition,
            results.len(),
            inputs.len(),
            written.display()
        );
        Ok(results.len())
    }

    /// Faltan intermedios. Todas las tareas map publican las N particiones
    /// antes de que abra la fase reduce y solo un reduce ya publicado los
    /// borra, así que esto es un intento anterior que ya hizo commit (o un
    /// map rezagado que re-publicó después). La salida existente se conserva.
    fn keep_committed_output(
        &self,
        partition: PartitionIndex,
        leftovers: &[PathBuf],
        seen: usize,
        map_count: u32,
    ) -> Result<usize> {
        let output_path = self.output_dir.join(shuffle::output_file_name(partition));
        if !output_path.is_file() {
            bail!(
                "reduce {}: solo hay intermedios de {} de {} tareas map y no existe {}",
                partition,
                seen,
                map_count,
                output_path.display()
            );
        }

        info!(
            "reduce {}: {} ya publicado por otro intento ({} de {} intermedios presentes), se conserva",
            partition,
            output_path.display(),
            seen,
            map_count
        );
        shuffle::remove_intermediate(leftovers)
            .with_context(|| format!("no se pudieron borrar intermedios de la partición {partition}"))?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{app, KeyValue};
    use std::{env, io::Write, sync::Arc, thread};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("worker_executor_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    fn wordcount() -> App {
        app::lookup("wordcount").unwrap()
    }

    fn write_input(dir: &Path, name: &str, text: &str) -> String {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        write!(f, "{}", text).unwrap();
        path.to_string_lossy().to_string()
    }

    fn files_with_prefix(dir: &Path, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.starts_with(prefix))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn map_partitions_output_by_key_hash() {
        let tmp = temp_dir("map");
        let inter = tmp.join("inter");
        let input = write_input(&tmp, "in.txt", "Hola hola mundo\nmundo mundo prueba");
        let exec = Executor::new(wordcount(), &inter, tmp.join("out"));

        let emitted = exec.execute_map(7, &input, 3).unwrap();
        assert_eq!(emitted, 6);

        let mut total = 0;
        for name in files_with_prefix(&inter, "mr-int-") {
            let (map_id, p) = shuffle::parse_intermediate_file_name(&name).unwrap();
            assert_eq!(map_id, 7);
            let kvs = shuffle::read_intermediate(&inter.join(&name)).unwrap();
            assert!(kvs.iter().all(|kv| shuffle::partition_for(&kv.key, 3) == p));
            total += kvs.len();
        }
        assert_eq!(total, 6);
    }

    #[test]
    fn map_with_missing_input_fails_without_publishing() {
        let tmp = temp_dir("map_missing");
        let inter = tmp.join("inter");
        let exec = Executor::new(wordcount(), &inter, tmp.join("out"));

        let missing = tmp.join("no_existe.txt");
        let res = exec.execute_map(0, &missing.to_string_lossy(), 2);

        assert!(res.is_err());
        assert!(!inter.exists() || files_with_prefix(&inter, "mr-int-").is_empty());
    }

    fn read_out(out: &Path, p: u32) -> String {
        fs::read_to_string(out.join(shuffle::output_file_name(p))).unwrap()
    }

    #[test]
    fn map_publishes_every_partition_even_empty_ones() {
        let tmp = temp_dir("map_all_partitions");
        let inter = tmp.join("inter");
        let input = write_input(&tmp, "in.txt", "");
        let exec = Executor::new(wordcount(), &inter, tmp.join("out"));

        assert_eq!(exec.execute_map(2, &input, 3).unwrap(), 0);
        assert_eq!(
            files_with_prefix(&inter, "mr-int-"),
            vec!["mr-int-2-0.jsonl", "mr-int-2-1.jsonl", "mr-int-2-2.jsonl"]
        );
    }

    #[test]
    fn reduce_merges_all_maps_sorts_keys_and_cleans_up() {
        let tmp = temp_dir("reduce");
        let inter = tmp.join("inter");
        let out = tmp.join("out");
        let exec = Executor::new(wordcount(), &inter, &out);

        // una sola partición para que todas las claves caigan en la 0
        shuffle::write_intermediate(
            &inter,
            0,
            vec![KeyValue::new("b", "1"), KeyValue::new("a", "1")],
            1,
        )
        .unwrap();
        shuffle::write_intermediate(
            &inter,
            1,
            vec![KeyValue::new("a", "1"), KeyValue::new("c", "1")],
            1,
        )
        .unwrap();

        let keys = exec.execute_reduce(0, 2).unwrap();
        assert_eq!(keys, 3);

        assert_eq!(read_out(&out, 0), "a 2\nb 1\nc 1\n");
        assert!(files_with_prefix(&inter, "mr-int-").is_empty());
    }

    #[test]
    fn reduce_only_reads_its_own_partition() {
        let tmp = temp_dir("reduce_own");
        let inter = tmp.join("inter");
        let out = tmp.join("out");
        fs::create_dir_all(&inter).unwrap();
        fs::write(inter.join("mr-int-0-0.jsonl"), "").unwrap();
        fs::write(
            inter.join("mr-int-0-1.jsonl"),
            "{\"key\":\"otro\",\"value\":\"1\"}\n",
        )
        .unwrap();

        let exec = Executor::new(wordcount(), &inter, &out);
        assert_eq!(exec.execute_reduce(0, 1).unwrap(), 0);

        assert_eq!(read_out(&out, 0), "");
        // el intermedio de la partición 1 sigue ahí
        assert_eq!(files_with_prefix(&inter, "mr-int-"), vec!["mr-int-0-1.jsonl"]);
    }

    #[test]
    fn retried_reduce_keeps_committed_output() {
        let tmp = temp_dir("reduce_retry");
        let inter = tmp.join("inter");
        let out = tmp.join("out");
        let exec = Executor::new(wordcount(), &inter, &out);

        shuffle::write_intermediate(&inter, 0, vec![KeyValue::new("x", "1")], 1).unwrap();
        exec.execute_reduce(0, 1).unwrap();

        // segundo intento (lease vencido): los intermedios ya no están
        exec.execute_reduce(0, 1).unwrap();
        assert_eq!(read_out(&out, 0), "x 1\n");
    }

    #[test]
    fn straggling_map_republish_does_not_clobber_committed_output() {
        let tmp = temp_dir("reduce_straggler");
        let inter = tmp.join("inter");
        let out = tmp.join("out");
        let exec = Executor::new(wordcount(), &inter, &out);

        shuffle::write_intermediate(&inter, 0, vec![KeyValue::new("a", "1")], 1).unwrap();
        shuffle::write_intermediate(&inter, 1, vec![KeyValue::new("b", "1")], 1).unwrap();
        exec.execute_reduce(0, 2).unwrap();
        assert_eq!(read_out(&out, 0), "a 1\nb 1\n");

        // el map 1 original, con el lease vencido, vuelve a publicar tarde
        shuffle::write_intermediate(&inter, 1, vec![KeyValue::new("b", "1")], 1).unwrap();

        // reintento del reduce: ve solo 1 de 2 maps, no pisa la salida
        assert_eq!(exec.execute_reduce(0, 2).unwrap(), 0);
        assert_eq!(read_out(&out, 0), "a 1\nb 1\n");
        assert!(files_with_prefix(&inter, "mr-int-").is_empty());
    }

    #[test]
    fn empty_partition_replaces_output_left_by_another_job() {
        let tmp = temp_dir("reduce_stale");
        let inter = tmp.join("inter");
        let out = tmp.join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("mr-out-0"), "viejo 99\n").unwrap();

        // el map de este job no emitió nada para la partición 0
        shuffle::write_intermediate(&inter, 0, Vec::new(), 1).unwrap();

        let exec = Executor::new(wordcount(), &inter, &out);
        assert_eq!(exec.execute_reduce(0, 1).unwrap(), 0);
        assert_eq!(read_out(&out, 0), "");

        // sin tareas map tampoco se conserva lo viejo
        fs::write(out.join("mr-out-1"), "viejo 99\n").unwrap();
        assert_eq!(exec.execute_reduce(1, 0).unwrap(), 0);
        assert_eq!(read_out(&out, 1), "");
    }

    #[test]
    fn incomplete_inputs_without_output_fail_and_keep_inputs() {
        let tmp = temp_dir("reduce_incomplete");
        let inter = tmp.join("inter");
        let out = tmp.join("out");
        let exec = Executor::new(wordcount(), &inter, &out);

        shuffle::write_intermediate(&inter, 0, vec![KeyValue::new("a", "1")], 1).unwrap();

        assert!(exec.execute_reduce(0, 2).is_err());
        assert!(!out.join("mr-out-0").exists());
        assert_eq!(files_with_prefix(&inter, "mr-int-"), vec!["mr-int-0-0.jsonl"]);
    }

    #[test]
    fn concurrent_attempts_of_same_reduce_publish_complete_output() {
        let tmp = temp_dir("reduce_race");
        let inter = tmp.join("inter");
        let out = tmp.join("out");
        let exec = Arc::new(Executor::new(wordcount(), &inter, &out));

        for round in 0..20 {
            let _ = fs::remove_file(out.join("mr-out-0"));
            for m in 0..4u32 {
                shuffle::write_intermediate(
                    &inter,
                    m,
                    vec![KeyValue::new(format!("k{m}"), "1"), KeyValue::new("comun", "1")],
                    1,
                )
                .unwrap();
            }

            // el intento original y el re-asignado corren a la vez
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let exec = exec.clone();
                    thread::spawn(move || exec.execute_reduce(0, 4))
                })
                .collect();
            for h in handles {
                h.join().unwrap().unwrap();
            }

            assert_eq!(
                read_out(&out, 0),
                "comun 4\nk0 1\nk1 1\nk2 1\nk3 1\n",
                "ronda {}",
                round
            );
            assert!(files_with_prefix(&inter, "mr-int-").is_empty());
        }
    }

    #[test]
    fn reduce_with_corrupt_intermediate_fails_and_keeps_inputs() {
        let tmp = temp_dir("reduce_corrupt");
        let inter = tmp.join("inter");
        let out = tmp.join("out");
        fs::create_dir_all(&inter).unwrap();
        fs::write(inter.join("mr-int-0-0.jsonl"), "esto no es json\n").unwrap();

        let exec = Executor::new(wordcount(), &inter, &out);
        assert!(exec.execute_reduce(0, 1).is_err());

        assert!(!out.join("mr-out-0").exists());
        assert_eq!(files_with_prefix(&inter, "mr-int-"), vec!["mr-int-0-0.jsonl"]);
    }
}
