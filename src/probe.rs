//! Resource metadata sampling.

use tracing::{info, warn};

use crate::models::ResourceMetadata;
use crate::traits::CatalogClient;

/// Rows sampled per resource.
pub const SAMPLE_ROWS: usize = 3;

pub fn sample_query(resource_id: &str) -> String {
    format!("SELECT * FROM \"{}\" LIMIT {}", resource_id, SAMPLE_ROWS)
}

/// Sample a resource's fields and a few example rows.
///
/// Never fails: any catalog error yields empty metadata, which the SQL
/// synthesizer treats as "fields unknown".
pub async fn probe(catalog: &dyn CatalogClient, resource_id: &str) -> ResourceMetadata {
    match catalog.query_sql(&sample_query(resource_id)).await {
        Ok(result) => {
            let mut examples = result.records;
            examples.truncate(SAMPLE_ROWS);
            info!(
                resource_id,
                fields = result.fields.len(),
                samples = examples.len(),
                "resource metadata sampled"
            );
            ResourceMetadata {
                fields: result.fields,
                examples,
            }
        }
        Err(e) => {
            warn!(resource_id, error = %e, "metadata probe failed, continuing without fields");
            ResourceMetadata::default()
        }
    }
}
