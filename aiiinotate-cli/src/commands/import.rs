//! Import command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::Value;
use tracing::{info, warn};

use aiiinotate_core::{
    Aiiinotate, AiiinotateError, CoreConfig, DocumentStore, HttpManifestFetcher, InsertResult,
    ManifestFetcher, MemoryStore, PostgresStore, StaticManifestFetcher,
};

use crate::utils::{expand_list_files, read_json_files};
use crate::ImportType;

#[derive(Debug)]
pub struct ImportArgs {
    pub kind: ImportType,
    pub files: Vec<PathBuf>,
    pub list_file: bool,
    pub offline: bool,
    pub database_url: Option<String>,
    pub base_url: String,
    pub fetch_timeout_secs: u64,
    pub json: bool,
}

/// Execute the import command.
///
/// Every file is read and parsed before the first write.
pub async fn execute(args: ImportArgs) -> Result<()> {
    let paths = if args.list_file {
        expand_list_files(&args.files)?
    } else {
        args.files.clone()
    };
    let documents = read_json_files(&paths)?;
    info!(files = documents.len(), kind = ?args.kind, "Read input files");

    let mut config = CoreConfig::with_base_url(&args.base_url);
    config.fetch_timeout = Duration::from_secs(args.fetch_timeout_secs);

    let store = open_store(args.database_url.as_deref()).await?;
    let fetcher: Arc<dyn ManifestFetcher> = if args.offline {
        Arc::new(StaticManifestFetcher::empty())
    } else {
        Arc::new(HttpManifestFetcher::new(&config)?)
    };
    let service = Aiiinotate::init(config, store, fetcher);

    let mut total = InsertResult::default();
    for (path, document) in documents {
        let result = import_document(&service, args.kind, document)
            .await
            .with_context(|| format!("Import of {} failed", path.display()))?;
        info!(
            path = %path.display(),
            inserted = result.inserted_count,
            "Imported file"
        );
        total.absorb(result);
    }
    service.close().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&total)?);
    } else {
        print_summary(&total);
    }
    Ok(())
}

async fn open_store(database_url: Option<&str>) -> Result<Arc<dyn DocumentStore>> {
    match database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, 5)
                .await
                .context("Failed to connect to database")?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("No database configured, importing into an in-memory store");
            eprintln!(
                "{}",
                "No DATABASE_URL: importing into an in-memory store (nothing is persisted)".yellow()
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn import_document(
    service: &Aiiinotate,
    kind: ImportType,
    document: Value,
) -> aiiinotate_core::Result<InsertResult> {
    match kind {
        ImportType::Annotation => service.insert_annotation(document).await,
        ImportType::AnnotationList => service.insert_annotation_list(document).await,
        ImportType::AnnotationArray => service.insert_annotations(into_array(document)?).await,
        ImportType::Manifest => service.insert_manifest(document).await,
        ImportType::ManifestArray => service.insert_manifests(into_array(document)?).await,
    }
}

fn into_array(document: Value) -> aiiinotate_core::Result<Vec<Value>> {
    match document {
        Value::Array(items) => Ok(items),
        _ => Err(AiiinotateError::InvalidInput(
            "expected a JSON array at the top level".into(),
        )),
    }
}

fn print_summary(result: &InsertResult) {
    println!(
        "{} {}",
        "Inserted".green().bold(),
        format!("{} document(s)", result.inserted_count).green()
    );
    for id in &result.inserted_ids {
        println!("  {id}");
    }
    if !result.pre_existing_ids.is_empty() {
        println!(
            "{} {} already stored",
            "Skipped".yellow().bold(),
            result.pre_existing_ids.len()
        );
    }
    for uri in &result.fetch_error_ids {
        println!("{} {uri}", "Could not fetch".red().bold());
    }
    for (key, reason) in &result.rejected_ids {
        println!("{} {key}: {reason}", "Rejected".red().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_array_requires_array() {
        assert_eq!(into_array(json!([1, 2])).unwrap().len(), 2);
        assert!(matches!(
            into_array(json!({ "@id": "x" })),
            Err(AiiinotateError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_import_document_dispatches_by_kind() {
        let service = Aiiinotate::init(
            CoreConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(StaticManifestFetcher::empty()),
        );
        let annotation = json!({
            "@type": "oa:Annotation",
            "on": "https://iiif.example.org/m1/canvas/c0#xywh=0,0,5,5",
            "resource": { "@type": "dctypes:Text", "chars": "hi" }
        });

        let result = import_document(&service, ImportType::AnnotationArray, json!([annotation.clone(), annotation]))
            .await
            .unwrap();
        assert_eq!(result.inserted_count, 2);

        let err = import_document(&service, ImportType::ManifestArray, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AiiinotateError::InvalidInput(_)));
    }
}
