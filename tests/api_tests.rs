use actix_web::{test, web, App};
use async_trait::async_trait;
use manhua_aggregator::aggregator::Aggregator;
use manhua_aggregator::api;
use manhua_aggregator::app_state::AppState;
use manhua_aggregator::config::AggregatorConfig;
use manhua_aggregator::error::AdapterError;
use manhua_aggregator::merge::Collection;
use manhua_aggregator::models::{ChapterInfo, SearchResult};
use manhua_aggregator::preferences::MemoryPreferenceStore;
use manhua_aggregator::registry::{AdapterKind, SourceDefinition, SourceRegistry};
use manhua_aggregator::sources::{AdapterMap, SiteAdapter};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

struct TitledAdapter {
    title: &'static str,
    chapter: f64,
}

#[async_trait]
impl SiteAdapter for TitledAdapter {
    async fn search(
        &self,
        source: &SourceDefinition,
        _query: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        Ok(vec![SearchResult::new(
            source,
            self.title,
            format!("{}/series/solo", source.base_url),
        )])
    }

    async fn latest_chapter(&self, _series_url: &str) -> Result<ChapterInfo, AdapterError> {
        Ok(ChapterInfo {
            chapter: Some(self.chapter),
            updated_at: None,
        })
    }
}

fn state() -> web::Data<AppState> {
    let def = |id: &str, kind| {
        let base = format!("https://{}.example", id);
        SourceDefinition::new(id, &id.to_uppercase(), &base, &format!("{}/?s={{query}}", base), kind)
    };
    let registry = SourceRegistry::new(vec![
        def("alpha", AdapterKind::LooseHtml),
        def("beta", AdapterKind::TemplatedHtml),
    ])
    .unwrap();

    let mut adapters: AdapterMap = HashMap::new();
    adapters.insert(
        AdapterKind::LooseHtml,
        Arc::new(TitledAdapter { title: "Solo Leveling", chapter: 200.0 }),
    );
    adapters.insert(
        AdapterKind::TemplatedHtml,
        Arc::new(TitledAdapter { title: "Solo Leveling (Official)", chapter: 201.0 }),
    );

    let aggregator = Aggregator::new(registry, adapters, &AggregatorConfig::default());
    web::Data::new(AppState::new(
        aggregator,
        Box::new(MemoryPreferenceStore::new()),
        Collection::default(),
    ))
}

#[actix_web::test]
async fn test_sources_and_selection() {
    let app = test::init_service(App::new().app_data(state()).configure(api::configure)).await;

    let req = test::TestRequest::get().uri("/sources").to_request();
    let sources: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(sources.as_array().unwrap().len(), 2);

    let req = test::TestRequest::put()
        .uri("/sources/selected")
        .set_json(json!({ "sources": ["beta", "missing"] }))
        .to_request();
    let saved: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(saved["sources"], json!(["beta"]));

    // searches without a sources parameter use the stored selection
    let req = test::TestRequest::get().uri("/search?q=solo").to_request();
    let results: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(results.as_array().unwrap().len(), 1);
    assert_eq!(results[0]["source_id"], "beta");
}

#[actix_web::test]
async fn test_search_track_and_check_updates() {
    let app = test::init_service(App::new().app_data(state()).configure(api::configure)).await;

    let req = test::TestRequest::get()
        .uri("/search?q=Solo%20Leveling&sources=alpha,beta")
        .to_request();
    let results: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(results.as_array().unwrap().len(), 2);
    assert_eq!(results[0]["source_id"], "alpha");

    let req = test::TestRequest::post()
        .uri("/tracked")
        .set_json(json!({ "anchor": results[0], "pool": results }))
        .to_request();
    let outcome: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(outcome["outcome"], "created");
    assert_eq!(outcome["sources"], 2);

    let req = test::TestRequest::post().uri("/tracked/check-updates").to_request();
    let checked: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(checked["checked"], 2);
    assert_eq!(checked["advanced"], 2);

    let req = test::TestRequest::get().uri("/tracked").to_request();
    let tracked: Value = test::call_and_read_body_json(&app, req).await;
    let sources = tracked[0]["sources"].as_array().unwrap();
    assert_eq!(sources[0]["latest_chapter"], 200.0);
    assert_eq!(sources[1]["latest_chapter"], 201.0);

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let metrics: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(metrics.as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn test_unknown_discovery_category_is_rejected() {
    let app = test::init_service(App::new().app_data(state()).configure(api::configure)).await;
    let req = test::TestRequest::get().uri("/discover/hottest").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::get().uri("/discover/popular?sources=alpha").to_request();
    let results: Value = test::call_and_read_body_json(&app, req).await;
    assert!(results.as_array().unwrap().is_empty());
}
