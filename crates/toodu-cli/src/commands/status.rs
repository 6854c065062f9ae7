//! Service status command

use anyhow::Result;
use tabled::Tabled;
use toodu_lib::ServiceInfo;

use crate::client::ApiClient;
use crate::output::{print_rows, print_success, OutputFormat};

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "API")]
    api: String,
    #[tabled(rename = "Status")]
    status: u16,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Server Time")]
    timestamp: String,
}

/// Check that the API is up and print its version
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let info: ServiceInfo = client.get("api/v1/").await?;

    if let OutputFormat::Table = format {
        print_success(&info.message);
    }

    let rows = vec![StatusRow {
        api: client.base_url().to_string(),
        status: info.status,
        version: info.version.clone(),
        timestamp: info.timestamp.to_rfc3339(),
    }];
    print_rows(rows, &info, format)
}
