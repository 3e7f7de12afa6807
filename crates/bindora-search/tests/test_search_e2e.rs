//! End-to-end searches against stub encoders and in-memory sources.
//!
//! Run with:
//! ```bash
//! cargo test --package bindora-search --test test_search_e2e
//! ```

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use bindora_common::{BindoraError, MoleculeCandidate};
use bindora_config::Config;
use bindora_embed::{StubMoleculeEncoder, StubTargetEncoder};
use bindora_search::SearchService;
use bindora_sources::{MockSequenceSource, StaticCatalog};
use bindora_test_utils::{
    kras_info, non_druglike_properties, sample_catalog, sample_sequences, CountingMoleculeEncoder,
    CountingTargetEncoder, ASPIRIN, CAFFEINE, EGFR_FRAGMENT, IBUPROFEN, MALFORMED_SMILES,
    TEST_DIMENSION, TEST_SEQUENCE,
};

fn service_with(catalog: StaticCatalog, sequences: MockSequenceSource) -> SearchService {
    SearchService::builder(Config::default())
        .target_encoder(Arc::new(StubTargetEncoder::new("stub", TEST_DIMENSION)))
        .molecule_encoder(Arc::new(StubMoleculeEncoder::new("stub", TEST_DIMENSION, 2)))
        .sequences(Arc::new(sequences))
        .catalog(Arc::new(catalog))
        .build()
        .unwrap()
}

fn sample_service() -> SearchService {
    service_with(sample_catalog(), sample_sequences())
}

fn ids(results: &[bindora_common::EnrichedPrediction]) -> Vec<&str> {
    results.iter().map(|r| r.id.as_str()).collect()
}

// ── Query validation ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_query_is_validation_error() {
    let service = sample_service();
    for kind in ["disease", "gene", "sequence"] {
        let err = service.search("   ", kind, 10).await.unwrap_err();
        assert!(matches!(err, BindoraError::Validation(_)), "kind {kind}: {err:?}");
    }
}

#[tokio::test]
async fn test_unsupported_kind_is_validation_error() {
    let err = sample_service().search("KRAS", "protein", 10).await.unwrap_err();
    assert!(matches!(err, BindoraError::Validation(_)));
}

#[tokio::test]
async fn test_zero_max_results_is_validation_error() {
    let err = sample_service().search(TEST_SEQUENCE, "sequence", 0).await.unwrap_err();
    assert!(matches!(err, BindoraError::Validation(_)));
}

#[tokio::test]
async fn test_unknown_gene_is_not_found() {
    let err = sample_service().search("NOTAGENE", "gene", 10).await.unwrap_err();
    assert!(matches!(err, BindoraError::NotFound(_)));
}

// ── Scoring and ranking ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_sequence_search_is_deterministic() {
    let catalog = || StaticCatalog::new().with(MoleculeCandidate::new("aspirin", ASPIRIN));
    let first = service_with(catalog(), MockSequenceSource::new())
        .search(TEST_SEQUENCE, "sequence", 10)
        .await
        .unwrap();
    let second = service_with(catalog(), MockSequenceSource::new())
        .search(TEST_SEQUENCE, "sequence", 10)
        .await
        .unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
    assert!((0.0..=100.0).contains(&first[0].score));
    assert_eq!(first[0].num_targets_tested, 1);
}

#[tokio::test]
async fn test_search_score_matches_scorer() {
    let service = service_with(
        StaticCatalog::new().with(MoleculeCandidate::new("aspirin", ASPIRIN)),
        MockSequenceSource::new(),
    );
    let results = service.search(TEST_SEQUENCE, "sequence", 10).await.unwrap();
    let direct = service.scorer().score(TEST_SEQUENCE, ASPIRIN).await.unwrap();
    assert!((results[0].score - direct).abs() < 1e-9);
}

#[tokio::test]
async fn test_malformed_molecule_is_skipped_not_fatal() {
    let catalog = StaticCatalog::new()
        .with(MoleculeCandidate::new("broken", MALFORMED_SMILES))
        .with(MoleculeCandidate::new("aspirin", ASPIRIN));
    let results = service_with(catalog, MockSequenceSource::new())
        .search(TEST_SEQUENCE, "sequence", 10)
        .await
        .unwrap();
    assert_eq!(ids(&results), vec!["aspirin"]);
}

#[tokio::test]
async fn test_malformed_molecule_with_catalog_properties_is_skipped_by_scorer() {
    let mut props = non_druglike_properties();
    props.molecular_weight = Some(150.0);
    props.logp = Some(1.0);
    props.hbd = Some(1);
    props.hba = Some(2);
    let catalog = StaticCatalog::new()
        .with(MoleculeCandidate::new("broken", MALFORMED_SMILES).with_properties(props))
        .with(MoleculeCandidate::new("aspirin", ASPIRIN));
    let results = service_with(catalog, MockSequenceSource::new())
        .search(TEST_SEQUENCE, "sequence", 10)
        .await
        .unwrap();
    assert_eq!(ids(&results), vec!["aspirin"]);
}

#[tokio::test]
async fn test_results_sorted_and_enriched() {
    let results = sample_service().search("KRAS", "gene", 10).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

    let aspirin = results.iter().find(|r| r.id == "aspirin").unwrap();
    assert_eq!(aspirin.name.as_deref(), Some("Aspirin"));
    assert_eq!(aspirin.clinical_phase, 4);
    assert_eq!(aspirin.structure, ASPIRIN);
    assert!(aspirin.is_drug_like);
    assert!(aspirin.properties.is_complete());
    assert_eq!(aspirin.properties.molecular_weight, Some(180.16));
}

#[tokio::test]
async fn test_max_results_truncates() {
    let results = sample_service().search("KRAS", "gene", 2).await.unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_max_results_clamped_to_limit() {
    let mut config = Config::default();
    config.search.max_results_limit = 1;
    let service = SearchService::builder(config)
        .target_encoder(Arc::new(StubTargetEncoder::new("stub", TEST_DIMENSION)))
        .molecule_encoder(Arc::new(StubMoleculeEncoder::new("stub", TEST_DIMENSION, 2)))
        .sequences(Arc::new(sample_sequences()))
        .catalog(Arc::new(sample_catalog()))
        .build()
        .unwrap();
    assert_eq!(service.search("KRAS", "gene", 50).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_min_score_filters_everything_below() {
    let mut config = Config::default();
    config.search.min_score = 100.0;
    let service = SearchService::builder(config)
        .target_encoder(Arc::new(StubTargetEncoder::new("stub", TEST_DIMENSION)))
        .molecule_encoder(Arc::new(StubMoleculeEncoder::new("stub", TEST_DIMENSION, 2)))
        .sequences(Arc::new(sample_sequences()))
        .catalog(Arc::new(sample_catalog()))
        .build()
        .unwrap();
    assert!(service.search("KRAS", "gene", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_druglike_molecules_filtered() {
    let catalog = StaticCatalog::new()
        .with(MoleculeCandidate::new("aspirin", ASPIRIN))
        .with(MoleculeCandidate::new("heavy", CAFFEINE).with_properties(non_druglike_properties()));
    let results = service_with(catalog, MockSequenceSource::new())
        .search(TEST_SEQUENCE, "sequence", 10)
        .await
        .unwrap();
    assert_eq!(ids(&results), vec!["aspirin"]);
}

#[tokio::test]
async fn test_duplicate_catalog_ids_keep_first() {
    let catalog = StaticCatalog::new()
        .with(MoleculeCandidate::new("dup", ASPIRIN).with_name("first"))
        .with(MoleculeCandidate::new("dup", IBUPROFEN).with_name("second"));
    let results = service_with(catalog, MockSequenceSource::new())
        .search(TEST_SEQUENCE, "sequence", 10)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name.as_deref(), Some("first"));
    assert_eq!(results[0].structure, ASPIRIN);
}

#[tokio::test]
async fn test_empty_catalog_returns_empty_list() {
    let results = service_with(StaticCatalog::new(), MockSequenceSource::new())
        .search(TEST_SEQUENCE, "sequence", 10)
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_catalog_failure_is_upstream_error() {
    let err = service_with(StaticCatalog::new().failing(), MockSequenceSource::new())
        .search(TEST_SEQUENCE, "sequence", 10)
        .await
        .unwrap_err();
    assert!(matches!(err, BindoraError::Upstream(_)));
}

// ── Multi-target ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_disease_search_aggregates_targets() {
    let results = sample_service().search("Lung Cancer", "disease", 10).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.num_targets_tested == 2));
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_failed_target_is_dropped() {
    let service = SearchService::builder(Config::default())
        .target_encoder(Arc::new(CountingTargetEncoder::new(TEST_DIMENSION).failing_on(EGFR_FRAGMENT)))
        .molecule_encoder(Arc::new(StubMoleculeEncoder::new("stub", TEST_DIMENSION, 2)))
        .sequences(Arc::new(sample_sequences()))
        .catalog(Arc::new(sample_catalog()))
        .build()
        .unwrap();

    let results = service.search("lung cancer", "disease", 10).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.num_targets_tested == 1));

    let err = service.search("EGFR", "gene", 10).await.unwrap_err();
    assert!(matches!(err, BindoraError::Upstream(_)));
}

#[tokio::test]
async fn test_search_timeout() {
    let service = SearchService::builder(Config::default())
        .target_encoder(Arc::new(
            CountingTargetEncoder::new(TEST_DIMENSION).with_delay(Duration::from_secs(5)),
        ))
        .molecule_encoder(Arc::new(StubMoleculeEncoder::new("stub", TEST_DIMENSION, 2)))
        .sequences(Arc::new(sample_sequences()))
        .catalog(Arc::new(sample_catalog()))
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let err = service.search("KRAS", "gene", 10).await.unwrap_err();
    match err {
        BindoraError::Upstream(msg) => assert_eq!(msg, "search timed out"),
        other => panic!("expected timeout, got {other:?}"),
    }
}

// ── Caching ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_repeat_search_served_from_cache() {
    let targets = Arc::new(CountingTargetEncoder::new(TEST_DIMENSION));
    let molecules = Arc::new(CountingMoleculeEncoder::new(TEST_DIMENSION));
    let sequences = Arc::new(sample_sequences());
    let service = SearchService::builder(Config::default())
        .target_encoder(targets.clone())
        .molecule_encoder(molecules.clone())
        .sequences(sequences.clone())
        .catalog(Arc::new(sample_catalog()))
        .build()
        .unwrap();

    let first = service.search("KRAS", "gene", 10).await.unwrap();
    let second = service.search("kras", "gene", 10).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(sequences.calls(), 1);
    assert_eq!(targets.calls(), 1);
    // aspirin, ibuprofen, caffeine; the malformed entry never reaches the encoder
    assert_eq!(molecules.calls(), 3);
    // one resolution + one target embedding + three fingerprints
    assert_eq!(service.cache_size().await.unwrap(), 5);

    service.clear_caches().await.unwrap();
    assert_eq!(service.cache_size().await.unwrap(), 0);

    service.search("KRAS", "gene", 10).await.unwrap();
    assert_eq!(sequences.calls(), 2);
    assert_eq!(targets.calls(), 2);
}

// ── Details & explanation ───────────────────────────────────────────────────

#[tokio::test]
async fn test_molecule_details() {
    let service = sample_service();
    let details = service.molecule_details("caffeine").await.unwrap();
    assert_eq!(details.name.as_deref(), Some("Caffeine"));
    assert!(details.drug_likeness.is_drug_like);
    assert!(details.properties.is_complete());

    let err = service.molecule_details("CHEMBL0").await.unwrap_err();
    assert!(matches!(err, BindoraError::NotFound(_)));
}

#[tokio::test]
async fn test_molecule_details_outside_catalog_page() {
    let mut config = Config::default();
    config.search.catalog_limit = 1;
    let catalog = StaticCatalog::new()
        .with(MoleculeCandidate::new("aspirin", ASPIRIN))
        .with(MoleculeCandidate::new("caffeine", CAFFEINE).with_name("Caffeine"))
        .with_unlisted(MoleculeCandidate::new("ibuprofen", IBUPROFEN).with_name("Ibuprofen"));
    let service = SearchService::builder(config)
        .target_encoder(Arc::new(StubTargetEncoder::new("stub", TEST_DIMENSION)))
        .molecule_encoder(Arc::new(StubMoleculeEncoder::new("stub", TEST_DIMENSION, 2)))
        .sequences(Arc::new(MockSequenceSource::new()))
        .catalog(Arc::new(catalog))
        .build()
        .unwrap();

    let caffeine = service.molecule_details("caffeine").await.unwrap();
    assert_eq!(caffeine.name.as_deref(), Some("Caffeine"));
    let ibuprofen = service.molecule_details("ibuprofen").await.unwrap();
    assert!(ibuprofen.drug_likeness.is_drug_like);
}

#[tokio::test]
async fn test_molecule_details_for_malformed_structure_uses_defaults() {
    let details = sample_service().molecule_details("broken").await.unwrap();
    assert_eq!(details.properties.molecular_weight, Some(0.0));
}

#[tokio::test]
async fn test_explain_matches_search_score() {
    let service = service_with(
        StaticCatalog::new().with(MoleculeCandidate::new("aspirin", ASPIRIN)),
        MockSequenceSource::new(),
    );
    let results = service.search(TEST_SEQUENCE, "sequence", 10).await.unwrap();
    let explanation = service.explain(TEST_SEQUENCE, ASPIRIN).await.unwrap();
    assert!((explanation.score - results[0].score).abs() < 1e-9);
    assert_eq!(explanation.target_dimension, TEST_DIMENSION);

    let err = service.explain("NOT A PROTEIN 1", ASPIRIN).await.unwrap_err();
    assert!(matches!(err, BindoraError::Validation(_)));
}

// ── Similar molecules ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_similar_molecules_ranked_by_tanimoto() {
    let similar = sample_service().similar_molecules(ASPIRIN, 10).await.unwrap();

    let ids: Vec<&str> = similar.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids.len(), 3, "malformed catalog entry is skipped: {ids:?}");
    assert!(!ids.contains(&"broken"));
    assert_eq!(ids[0], "aspirin");
    assert!((similar[0].similarity - 1.0).abs() < 1e-9);
    assert!(similar.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    assert!(similar.iter().all(|s| (0.0..=1.0).contains(&s.similarity)));
}

#[tokio::test]
async fn test_similar_to_molecule_excludes_itself() {
    let service = sample_service();
    let similar = service.similar_to_molecule("aspirin", 10).await.unwrap();
    assert_eq!(similar.len(), 2);
    assert!(similar.iter().all(|s| s.id != "aspirin" && s.similarity < 1.0));

    let top = service.similar_to_molecule("aspirin", 1).await.unwrap();
    assert_eq!(top, similar[..1].to_vec());
}

#[tokio::test]
async fn test_similar_molecules_input_errors() {
    let service = sample_service();
    assert!(matches!(service.similar_molecules("  ", 5).await, Err(BindoraError::Validation(_))));
    assert!(matches!(service.similar_molecules(ASPIRIN, 0).await, Err(BindoraError::Validation(_))));
    assert!(matches!(
        service.similar_molecules(MALFORMED_SMILES, 5).await,
        Err(BindoraError::Encoding(_))
    ));
    assert!(matches!(service.similar_to_molecule("CHEMBL0", 5).await, Err(BindoraError::NotFound(_))));
}

// ── Target annotation ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_target_info() {
    let service = sample_service();
    assert_eq!(service.target_info("kras").await.unwrap(), kras_info());
    assert_eq!(service.target_info("P01116").await.unwrap().gene.as_deref(), Some("KRAS"));

    let err = service.target_info("EGFR").await.unwrap_err();
    assert!(matches!(err, BindoraError::NotFound(_)));
}
