//! Identity command - decode a request identity header

use aggregator_core::services::auth::{AuthService, AUTHORIZATION_HEADER, IDENTITY_HEADER};
use anyhow::{Context, Result};
use colored::Colorize;

use crate::output;

pub fn run(token: &str, bearer: bool, json: bool) -> Result<()> {
    let auth = AuthService::new(bearer);
    let identity = if bearer {
        auth.identity_from_bearer(token)
    } else {
        auth.identity_from_header(token)
    }
    .with_context(|| format!("Request would be rejected (header: {})", auth.header_name()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&identity)?);
        return Ok(());
    }

    let source = if bearer { AUTHORIZATION_HEADER } else { IDENTITY_HEADER };
    println!("{}", format!("Identity from {}", source).bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Account number", identity.user_id()]);
    table.add_row(vec!["Organization", identity.org_id()]);
    println!("{}", table);

    Ok(())
}
