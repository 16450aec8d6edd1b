//! Writes the OpenAPI specification for the Folio API to disk.
//!
//! Usage: `openapi [output-path]`, defaulting to `openapi.json` in the
//! current directory.

use std::{env, fs, path::PathBuf};

use folio_api::router::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output: PathBuf = env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string())
        .into();

    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    fs::write(&output, spec_json)?;
    println!("Wrote OpenAPI specification to {}", output.display());
    Ok(())
}
