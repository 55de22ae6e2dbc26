use db::Repositories;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_gauge_vec, Encoder, IntCounter, IntGaugeVec};

static STORED_ENTITIES: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "softdesk_stored_entities",
        "Number of rows stored per entity kind",
        &["kind"]
    )
    .expect("stored_entities gauge")
});

static TOKEN_PAIRS_ISSUED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "softdesk_token_pairs_issued_total",
        "Access/refresh token pairs issued by the login endpoint"
    )
    .expect("token_pairs_issued counter")
});

pub fn record_token_pair_issued() {
    TOKEN_PAIRS_ISSUED.inc();
}

pub async fn refresh_entity_counts(repos: &dyn Repositories) -> Result<(), db::DbError> {
    let counts = repos.stats().entity_counts().await?;
    STORED_ENTITIES.with_label_values(&["users"]).set(counts.users);
    STORED_ENTITIES
        .with_label_values(&["projects"])
        .set(counts.projects);
    STORED_ENTITIES.with_label_values(&["issues"]).set(counts.issues);
    STORED_ENTITIES
        .with_label_values(&["comments"])
        .set(counts.comments);
    Ok(())
}

/// Text exposition of the default registry; returns the content type too.
pub fn render() -> Result<(String, Vec<u8>), prometheus::Error> {
    Lazy::force(&STORED_ENTITIES);
    Lazy::force(&TOKEN_PAIRS_ISSUED);

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}
