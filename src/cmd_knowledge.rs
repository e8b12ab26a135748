//! Knowledge base subcommands: graph, recommend, similar, match and stats.

use std::sync::Arc;

use tracing::info;

use formscout_config::Config;
use formscout_knowledge::{FieldPattern, GraphSnapshot, KnowledgeGraph, KnowledgeStore, RecommendationContext};
use formscout_protocols::{KnowledgeKind, KnowledgeRecord};

use crate::open_store;

fn parse_kind(kind: Option<&str>) -> Result<Option<KnowledgeKind>, Box<dyn std::error::Error>> {
    Ok(kind.map(str::parse::<KnowledgeKind>).transpose()?)
}

/// Parse `field=value` arguments into a field pattern.
pub(crate) fn parse_patterns(patterns: &[String]) -> Result<FieldPattern, String> {
    patterns
        .iter()
        .map(|p| match p.split_once('=') {
            Some((field, value)) if !field.trim().is_empty() => {
                Ok((field.trim().to_ascii_lowercase(), value.to_string()))
            }
            _ => Err(format!("expected field=value, got '{}'", p)),
        })
        .collect()
}

fn summary(record: &KnowledgeRecord) -> String {
    let text = record.payload.embedding_text();
    if text.chars().count() > 60 {
        format!("{}...", text.chars().take(57).collect::<String>())
    } else {
        text
    }
}

fn print_records<'a>(rows: impl IntoIterator<Item = (&'a KnowledgeRecord, String)>) {
    println!("{:<20} {:<22} {:>6} {:>6} {:>8}  {}", "ID", "KIND", "CONF", "USES", "SCORE", "SUMMARY");
    println!("{}", "-".repeat(100));
    for (record, score) in rows {
        println!(
            "{:<20} {:<22} {:>6.2} {:>6} {:>8}  {}",
            record.resolved_id(),
            record.kind().as_str(),
            record.stats.confidence_score,
            record.stats.usage_count,
            score,
            summary(record)
        );
    }
}

/// Rebuild the graph so recommendations can draw on clusters and paths.
async fn rebuild_graph(
    store: &Arc<KnowledgeStore>,
    threshold: Option<f32>,
) -> Result<Arc<GraphSnapshot>, Box<dyn std::error::Error>> {
    let mut graph = KnowledgeGraph::new(store.clone());
    if let Some(threshold) = threshold {
        graph = graph.with_threshold(threshold);
    }
    Ok(graph.rebuild().await?)
}

pub(crate) async fn graph(config: &Config, threshold: Option<f32>) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config).await?;
    let snapshot = rebuild_graph(&store, threshold).await?;

    println!("Nodes:          {}", snapshot.nodes.len());
    println!("Relationships:  {}", snapshot.edges.len());
    println!("Clusters:       {}", snapshot.clusters.len());
    println!("Learning paths: {}", snapshot.paths.len());

    if !snapshot.clusters.is_empty() {
        println!();
        println!("{:<28} {:<22} {:>7} {:>9} {:>6}", "CLUSTER", "KIND", "MEMBERS", "COHESION", "ACCEL");
        for cluster in snapshot.top_clusters(10) {
            println!(
                "{:<28} {:<22} {:>7} {:>9.3} {:>6.2}",
                cluster.id,
                cluster.kind.as_str(),
                cluster.member_ids.len(),
                cluster.cohesion_score,
                cluster.acceleration_factor
            );
        }
    }

    if !snapshot.paths.is_empty() {
        println!();
        for path in snapshot.top_paths(5) {
            println!(
                "{} (hops {}, efficiency {:.3})",
                path.node_ids.join(" -> "),
                path.hops(),
                path.efficiency
            );
        }
    }
    Ok(())
}

pub(crate) async fn recommend(
    config: &Config,
    query: &str,
    platform: Option<String>,
    kind: Option<&str>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config).await?;
    rebuild_graph(&store, None).await?;

    let mut context = RecommendationContext::new(query, limit);
    if let Some(platform) = platform {
        context = context.with_platform(platform);
    }
    if let Some(kind) = parse_kind(kind)? {
        context = context.with_kind(kind);
    }

    let recommendations = store.recommend(&context).await?;
    if recommendations.is_empty() {
        println!("No recommendations.");
        return Ok(());
    }
    print_records(
        recommendations
            .iter()
            .map(|r| (&r.record, format!("{:.3}", r.confidence))),
    );
    println!();
    for r in &recommendations {
        println!("{}: {}", r.record.resolved_id(), r.reason);
    }
    Ok(())
}

pub(crate) async fn similar(
    config: &Config,
    query: &str,
    kind: Option<&str>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config).await?;
    let matches = store.find_by_similarity(query, parse_kind(kind)?, limit).await?;
    if matches.is_empty() {
        println!("No similar records.");
        return Ok(());
    }
    print_records(matches.iter().map(|m| (&m.record, format!("{:.3}", m.similarity))));
    Ok(())
}

pub(crate) async fn field_match(
    config: &Config,
    patterns: &[String],
    kind: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pattern = parse_patterns(patterns)?;
    let store = open_store(config).await?;
    let records = store.find_by_field_match(&pattern, parse_kind(kind)?).await?;
    if records.is_empty() {
        println!("No matching records.");
        return Ok(());
    }
    print_records(records.iter().map(|r| (r, format!("{:.2}", r.stats.success_rate))));
    Ok(())
}

pub(crate) async fn stats(config: &Config, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config).await?;
    let stats = store.stats().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => {
            println!("{:<24} {:>8}", "KIND", "RECORDS");
            println!("{}", "-".repeat(33));
            for kind in KnowledgeKind::ALL {
                println!("{:<24} {:>8}", kind.as_str(), stats.records.get(&kind).copied().unwrap_or(0));
            }
            println!("{}", "-".repeat(33));
            println!("{:<24} {:>8}", "total", stats.total_records());
            println!();
            println!("Relationships:   {}", stats.relationships);
            println!("Clusters:        {}", stats.clusters);
            println!("Usage events:    {}", stats.usage_events);
            println!("Indexed vectors: {}", stats.indexed_vectors);
        }
    }
    info!("{} records in store", stats.total_records());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_patterns() {
        let pattern = parse_patterns(&["Platform_Type=typeform".to_string(), "action=name".to_string()]).unwrap();
        assert_eq!(pattern.get("platform_type").map(String::as_str), Some("typeform"));
        assert_eq!(pattern.get("action").map(String::as_str), Some("name"));
    }

    #[test]
    fn test_parse_patterns_rejects_bare_values() {
        assert!(parse_patterns(&["typeform".to_string()]).is_err());
        assert!(parse_patterns(&["=typeform".to_string()]).is_err());
    }
}
