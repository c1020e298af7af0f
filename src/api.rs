//! JSON HTTP endpoints

use crate::app_state::AppState;
use crate::merge::TrackedSource;
use crate::models::{DiscoveryCategory, SearchResult};
use crate::preferences::{save_selected_sources, selected_sources};
use actix_web::{get, post, put, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
    sources: Option<String>,
}

#[derive(Deserialize)]
struct SourcesQuery {
    sources: Option<String>,
}

#[derive(Deserialize)]
struct ChapterQuery {
    url: String,
}

#[derive(Deserialize)]
struct SelectionBody {
    sources: Vec<String>,
}

#[derive(Deserialize)]
struct AttachBody {
    anchor: SearchResult,
    #[serde(default)]
    pool: Vec<SearchResult>,
}

/// Ids from a comma-separated `sources` parameter, or the stored selection
fn requested_sources(data: &AppState, param: Option<&str>) -> Vec<String> {
    let ids: Vec<String> = param
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        selected_sources(data.preferences.as_ref(), data.aggregator.registry())
    } else {
        ids
    }
}

#[get("/sources")]
async fn list_sources(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.aggregator.registry().get_enabled_sources())
}

#[get("/sources/selected")]
async fn get_selected(data: web::Data<AppState>) -> impl Responder {
    let ids = selected_sources(data.preferences.as_ref(), data.aggregator.registry());
    HttpResponse::Ok().json(json!({ "sources": ids }))
}

#[put("/sources/selected")]
async fn put_selected(data: web::Data<AppState>, body: web::Json<SelectionBody>) -> impl Responder {
    match save_selected_sources(data.preferences.as_ref(), data.aggregator.registry(), &body.sources) {
        Ok(saved) => HttpResponse::Ok().json(json!({ "sources": saved })),
        Err(e) => {
            log::error!("Failed to save source selection: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
        }
    }
}

#[get("/search")]
async fn search(data: web::Data<AppState>, query: web::Query<SearchQuery>) -> impl Responder {
    let ids = requested_sources(&data, query.sources.as_deref());
    let results = data.aggregator.search_multiple_sources(&query.q, &ids).await;
    HttpResponse::Ok().json(results)
}

#[get("/search/report")]
async fn search_report(data: web::Data<AppState>, query: web::Query<SearchQuery>) -> impl Responder {
    let ids = requested_sources(&data, query.sources.as_deref());
    let reports = data.aggregator.search_with_report(&query.q, &ids).await;
    let failed = reports.iter().filter(|r| !r.outcome.is_ok()).count();
    HttpResponse::Ok().json(json!({
        "sources": reports.len(),
        "failed": failed,
        "reports": reports,
    }))
}

#[get("/discover/{category}")]
async fn discover(
    data: web::Data<AppState>,
    category: web::Path<String>,
    query: web::Query<SourcesQuery>,
) -> impl Responder {
    let category: DiscoveryCategory = match category.parse() {
        Ok(c) => c,
        Err(e) => return HttpResponse::BadRequest().json(json!({ "error": e })),
    };
    let ids = requested_sources(&data, query.sources.as_deref());
    HttpResponse::Ok().json(data.aggregator.discover_from_sources(category, &ids).await)
}

#[get("/chapter/latest")]
async fn latest_chapter(data: web::Data<AppState>, query: web::Query<ChapterQuery>) -> impl Responder {
    HttpResponse::Ok().json(data.aggregator.get_latest_chapter(&query.url).await)
}

#[get("/tracked")]
async fn list_tracked(data: web::Data<AppState>) -> impl Responder {
    let entries = data.collection().entries().to_vec();
    HttpResponse::Ok().json(entries)
}

#[post("/tracked")]
async fn attach_tracked(data: web::Data<AppState>, body: web::Json<AttachBody>) -> impl Responder {
    let body = body.into_inner();
    let outcome = data.collection().attach(&body.anchor, &body.pool);
    HttpResponse::Ok().json(outcome)
}

#[post("/tracked/check-updates")]
async fn check_updates(data: web::Data<AppState>) -> impl Responder {
    let tracked: Vec<TrackedSource> = data.collection().tracked_sources();
    let updates = data.aggregator.check_updates(&tracked).await;
    let advanced = data.collection().apply_updates(&updates);
    HttpResponse::Ok().json(json!({
        "checked": updates.len(),
        "advanced": advanced,
        "updates": updates
            .iter()
            .map(|(source, info)| json!({ "url": source.url, "source_id": source.source_id, "chapter": info }))
            .collect::<Vec<_>>(),
    }))
}

#[get("/metrics")]
async fn get_metrics(data: web::Data<AppState>) -> impl Responder {
    let all_metrics = data.aggregator.metrics().get_all_metrics();
    let metrics_json: Vec<serde_json::Value> = all_metrics
        .iter()
        .map(|m| {
            json!({
                "source_id": m.source_id,
                "success_rate": format!("{:.2}%", m.success_rate()),
                "total_requests": m.total_requests,
                "successful_requests": m.successful_requests,
                "empty_results": m.empty_results,
                "failed_requests": m.failed_requests,
                "timeout_count": m.timeout_count,
                "average_response_time_ms": format!("{:.2}", m.average_response_time_ms),
                "last_success": m.last_success,
                "last_failure": m.last_failure,
                "last_error": m.last_error,
            })
        })
        .collect();
    HttpResponse::Ok().json(metrics_json)
}

/// Register every endpoint on an app
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_sources)
        .service(get_selected)
        .service(put_selected)
        .service(search_report)
        .service(search)
        .service(discover)
        .service(latest_chapter)
        .service(check_updates)
        .service(list_tracked)
        .service(attach_tracked)
        .service(get_metrics);
}
