//! `check`: validate the certificate document and list its TLSA records.

use sir_core::RecordSummary;
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Cert")]
    cert: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Key file")]
    key_file: String,
    #[tabled(rename = "TTL")]
    ttl: u32,
    #[tabled(rename = "Usage")]
    usage: String,
    #[tabled(rename = "Selector")]
    selector: String,
    #[tabled(rename = "Type")]
    ty: String,
}

impl From<&RecordSummary> for RecordRow {
    fn from(r: &RecordSummary) -> Self {
        Self {
            cert: r.cert.clone(),
            owner: r.owner.clone(),
            zone: r.zone.clone(),
            server: format!("{}:{}", r.server, r.server_port),
            key_file: r.key_file.clone().unwrap_or_else(|| "-".into()),
            ttl: r.params.ttl,
            usage: r.params.usage.to_string(),
            selector: r.params.selector.to_string(),
            ty: r.params.ty.to_string(),
        }
    }
}

/// `<cert> <owner> <ttl> TLSA <usage> <selector> <type>` with numeric codes.
fn plain_line(r: &RecordSummary) -> String {
    format!(
        "{} {} {} TLSA {} {} {}",
        r.cert,
        r.owner,
        r.params.ttl,
        r.params.usage.code(),
        r.params.selector.code(),
        r.params.ty.code()
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    let graph = config::load_graph(&resolved.document)?;
    let records = graph.record_summaries();

    let out = output::render_list(
        &global.output,
        &records,
        |r| RecordRow::from(r),
        plain_line,
    )?;
    output::print_output(&out, global.quiet);

    if !global.quiet {
        let color = output::should_color(&global.color);
        let summary = format!(
            "{} is valid: {} certs, {} domains, {} zones, {} records",
            resolved.document.display(),
            graph.certs.len(),
            graph.domains.len(),
            graph.zones.len(),
            records.len()
        );
        eprintln!("{}", output::success_line(&summary, color));
    }
    Ok(())
}
