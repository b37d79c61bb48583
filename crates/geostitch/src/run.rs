//! One invocation of the binary: read, reconstruct, optionally re-divide, write

use crate::cli::Settings;
use crate::error::Result;
use crate::io::{self, OutputDocument};
use geostitch_lib::Reconstructor;
use std::io::Write;

pub fn run(settings: &Settings) -> Result<()> {
    let mut config = io::load_config(settings.config.as_deref())?;
    if settings.workers.is_some() {
        config.workers = settings.workers;
    }
    tracing::info!("Using {} merge workers", config.worker_count());

    let document = io::read_input(&settings.input)?;
    let input = document.into_run_input(settings.boundary_relation)?;

    let reconstructor = Reconstructor::new(config);
    let mut output = reconstructor.run(input);

    if !settings.divide.is_empty() {
        tracing::info!("Re-dividing {} features", settings.divide.len());
        // Only fragments that survived clipping may be rebuilt into segments
        let features = std::mem::take(&mut output.features);
        let (features, diagnostics) =
            reconstructor.redivide(features, &settings.divide, &output.fragments);
        output.features = features;
        output.diagnostics.extend(diagnostics);
    }

    let document = OutputDocument::new(
        &output.features,
        &output.rejected,
        output.diagnostics,
        output.stats,
    );
    let encoded = io::encode(&document, settings.pretty)?;

    match &settings.output {
        Some(path) => {
            std::fs::write(path, encoded)?;
            tracing::info!(
                "Wrote {} features to {}",
                document.features.len(),
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(encoded.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_run_writes_output_file() {
        let dir = std::env::temp_dir().join(format!("geostitch-run-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("input.json");
        let output = dir.join("output.json");
        std::fs::write(
            &input,
            r#"{"fragments": [
                {"id": 1, "category": "coastline", "coordinates": [[0.0, 0.0], [1.0, 0.0]]},
                {"id": 2, "category": "coastline", "coordinates": [[1.0, 0.0], [2.0, 0.0]]}
            ]}"#,
        )
        .unwrap();

        let settings = Settings::parse_from([
            "geostitch",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "-w",
            "2",
        ]);
        run(&settings).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let features = written["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["polygon_id"], 1);
        assert_eq!(features[0]["category"], "02");
        assert_eq!(written["stats"]["fragments"], 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_divide_ignores_clipped_fragments() {
        let dir = std::env::temp_dir().join(format!("geostitch-divide-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("input.json");
        let output = dir.join("output.json");
        // Fragment 2 leaves the boundary; fragment 3 lies fully outside it but only
        // uses vertices of fragment 2
        std::fs::write(
            &input,
            r#"{
                "fragments": [
                    {"id": 1, "category": "coastline", "coordinates": [[0.0, 0.0], [1.0, 0.0]]},
                    {"id": 2, "category": "coastline", "coordinates": [[1.0, 0.0], [2.5, 0.0], [3.0, 0.0]]},
                    {"id": 3, "category": "coastline", "coordinates": [[3.0, 0.0], [2.5, 0.0]]}
                ],
                "boundary": [[[[-0.5, -0.5], [2.0, -0.5], [2.0, 0.5], [-0.5, 0.5], [-0.5, -0.5]]]]
            }"#,
        )
        .unwrap();

        let settings = Settings::parse_from([
            "geostitch",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--divide",
            "1",
        ]);
        run(&settings).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let features = written["features"].as_array().unwrap();
        let mut ids: Vec<u64> = features
            .iter()
            .map(|f| f["polygon_id"].as_u64().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(written["stats"]["clipped"], 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let settings = Settings::parse_from(["geostitch", "/nonexistent/geostitch/input.json"]);
        assert!(matches!(
            run(&settings),
            Err(crate::error::CliError::Read { .. })
        ));
    }
}
