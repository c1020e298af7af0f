use async_trait::async_trait;
use manhua_aggregator::aggregator::Aggregator;
use manhua_aggregator::config::{AggregatorConfig, Config};
use manhua_aggregator::error::FetchError;
use manhua_aggregator::http_client::Fetcher;
use manhua_aggregator::models::DiscoveryCategory;
use manhua_aggregator::registry::{AdapterKind, SourceDefinition, SourceRegistry};
use manhua_aggregator::sources::flamecomics::FlameComicsAdapter;
use manhua_aggregator::sources::generic::GenericAdapter;
use manhua_aggregator::sources::mangadex::MangaDexAdapter;
use manhua_aggregator::sources::wp_manga::WpMangaAdapter;
use manhua_aggregator::sources::{default_adapters, AdapterContext, SiteAdapter};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SOLO_ID: &str = "32d76d19-8a05-4db0-9fc2-e0b0648fe9d0";

/// Serves canned bodies and remembers every request with whether it skipped the relays
#[derive(Default)]
struct RecordingFetcher {
    bodies: Vec<(&'static str, &'static str)>,
    requests: Mutex<Vec<(String, bool)>>,
}

impl RecordingFetcher {
    fn serving(bodies: Vec<(&'static str, &'static str)>) -> Arc<Self> {
        Arc::new(Self {
            bodies,
            ..Self::default()
        })
    }

    fn requests(&self) -> Vec<(String, bool)> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, url: &str, direct: bool) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push((url.to_string(), direct));
        self.bodies
            .iter()
            .find(|(fragment, _)| url.contains(fragment))
            .map(|(_, body)| body.to_string())
            .ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

#[async_trait]
impl Fetcher for RecordingFetcher {
    async fn fetch_text(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        self.respond(url, false)
    }

    async fn fetch_direct(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        self.respond(url, true)
    }
}

fn builtin(id: &str) -> SourceDefinition {
    SourceRegistry::builtin()
        .unwrap()
        .get_source_by_id(id)
        .cloned()
        .unwrap()
}

const MANGA_LIST: &str = r#"{"result":"ok","data":[
  {"id":"32d76d19-8a05-4db0-9fc2-e0b0648fe9d0","type":"manga",
   "attributes":{"title":{"en":"Solo Leveling"},"lastChapter":"200","status":"completed"},
   "relationships":[{"id":"c1","type":"cover_art","attributes":{"fileName":"cover.jpg"}}]},
  {"id":"0b0c9b3f-5d5e-4b8a-9a41-8d1c0d3f1a22","type":"manga",
   "attributes":{"title":{"en":"Solo Max-Level Newbie"},"lastChapter":null,"status":"ongoing"},
   "relationships":[]}
]}"#;

const CHAPTER_FEED: &str = r#"{"result":"ok","data":[
  {"id":"ch1","type":"chapter","attributes":{"chapter":"200","publishAt":"2024-01-05T10:00:00+00:00","createdAt":"2024-01-04T10:00:00+00:00"}}
]}"#;

const MADARA_LISTING: &str = r#"<div class="page-listing-item">
  <div class="page-item-detail manga">
    <div class="item-thumb"><a href="https://manhuaus.com/manga/solo-leveling/"><img data-src="https://manhuaus.com/wp-content/solo.jpg"></a></div>
    <div class="item-summary">
      <div class="post-title font-title"><h3 class="h5"><a href="https://manhuaus.com/manga/solo-leveling/">Solo Leveling</a></h3></div>
      <div class="list-chapter"><div class="chapter-item"><span class="chapter font-meta"><a href="https://manhuaus.com/manga/solo-leveling/chapter-200/">Chapter 200</a></span></div></div>
    </div>
  </div>
  <div class="page-item-detail manga">
    <div class="item-summary">
      <div class="post-title font-title"><h3 class="h5"><a href="https://manhuaus.com/manga/martial-peak/">Martial Peak</a></h3></div>
    </div>
  </div>
</div>"#;

const LOOSE_PAGE: &str = r#"<div class="list">
  <div class="book-item"><a href="/manga/solo-leveling" title="Solo Leveling"><img src="/covers/solo.jpg"></a>
    <span class="latest-chapter">Chapter 200</span></div>
  <div class="book-item"><a href="/manga/tower-of-god" title="Tower of God"><img src="/covers/tog.jpg"></a></div>
  <a href="/genre/action">Action</a>
</div>"#;

const FLAME_BROWSE: &str = r#"<script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{
  "series":[
    {"series_id":2,"title":"Omniscient Reader's Viewpoint","cover":"cover.png"},
    {"series_id":7,"title":"The Greatest Estate Developer","cover":"ged.png"}
  ]}}}</script>"#;

#[tokio::test]
async fn test_mangadex_uses_direct_api_calls() {
    let fetcher = RecordingFetcher::serving(vec![("/chapter?", CHAPTER_FEED), ("/manga?", MANGA_LIST)]);
    let adapter = MangaDexAdapter::new(AdapterContext::new(fetcher.clone()));
    let source = builtin("mangadex");

    let results = adapter.search(&source, "Solo Leveling").await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].url, format!("https://mangadex.org/title/{}", SOLO_ID));

    let popular = adapter.discover(&source, DiscoveryCategory::Popular).await.unwrap();
    assert_eq!(popular.iter().map(|d| d.rank).collect::<Vec<_>>(), vec![Some(1), Some(2)]);

    let info = adapter
        .latest_chapter(&format!("https://mangadex.org/title/{}/solo-leveling", SOLO_ID))
        .await
        .unwrap();
    assert_eq!(info.chapter, Some(200.0));
    assert!(info.updated_at.is_some());

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|(_, direct)| *direct));
    assert_eq!(
        requests[0].0,
        "https://api.mangadex.org/manga?title=Solo%20Leveling&limit=15&includes[]=cover_art&order[relevance]=desc"
    );
    assert!(requests[1].0.contains("order[followedCount]=desc"));
    assert_eq!(
        requests[2].0,
        format!(
            "https://api.mangadex.org/chapter?manga={}&order[chapter]=desc&limit=1&translatedLanguage[]=en",
            SOLO_ID
        )
    );
}

#[tokio::test]
async fn test_mangadex_chapter_probe_needs_an_id() {
    let fetcher = RecordingFetcher::serving(vec![("/chapter?", CHAPTER_FEED)]);
    let adapter = MangaDexAdapter::new(AdapterContext::new(fetcher.clone()));
    assert!(adapter.latest_chapter("https://mangadex.org/titles/latest").await.is_err());
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn test_templated_discovery_goes_through_relays() {
    let fetcher = RecordingFetcher::serving(vec![("m_orderby=views", MADARA_LISTING)]);
    let adapter = WpMangaAdapter::new(AdapterContext::new(fetcher.clone()));
    let source = builtin("manhuaus");

    let popular = adapter.discover(&source, DiscoveryCategory::Popular).await.unwrap();
    assert_eq!(popular.len(), 2);
    assert_eq!(popular[0].result.title, "Solo Leveling");
    assert_eq!(popular[0].result.latest_chapter, Some(200.0));
    assert_eq!(popular[0].rank, Some(1));
    assert_eq!(popular[1].result.url, "https://manhuaus.com/manga/martial-peak/");
    assert_eq!(popular[1].rank, Some(2));

    assert_eq!(
        fetcher.requests(),
        vec![("https://manhuaus.com/manga/?m_orderby=views".to_string(), false)]
    );
}

#[tokio::test]
async fn test_loose_adapter_search_and_discovery() {
    let fetcher = RecordingFetcher::serving(vec![("mangabuddy.com", LOOSE_PAGE)]);
    let adapter = GenericAdapter::new(AdapterContext::new(fetcher.clone()));
    let source = builtin("mangabuddy");

    let results = adapter.search(&source, "solo").await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].url, "https://mangabuddy.com/manga/solo-leveling");
    assert_eq!(results[0].cover_url.as_deref(), Some("https://mangabuddy.com/covers/solo.jpg"));
    assert_eq!(results[0].latest_chapter, Some(200.0));

    // no listing configured, so nothing is fetched
    assert!(adapter.discover(&source, DiscoveryCategory::Popular).await.unwrap().is_empty());

    let with_listing = source
        .clone()
        .with_discovery(DiscoveryCategory::Latest, "https://mangabuddy.com/latest");
    let latest = adapter.discover(&with_listing, DiscoveryCategory::Latest).await.unwrap();
    assert_eq!(latest.len(), 2);
    assert!(latest.iter().all(|d| d.rank.is_none()));

    assert_eq!(
        fetcher.requests(),
        vec![
            ("https://mangabuddy.com/search?q=solo".to_string(), false),
            ("https://mangabuddy.com/latest".to_string(), false),
        ]
    );
}

#[tokio::test]
async fn test_flame_search_uses_configured_matching() {
    let config = Config::from_toml("[matching]\noverlap_threshold = 0.6\n").unwrap();
    let fetcher = RecordingFetcher::serving(vec![("flamecomics.xyz/browse", FLAME_BROWSE)]);
    let source = builtin("flamecomics");

    let strict = FlameComicsAdapter::new(AdapterContext::new(fetcher.clone()));
    assert!(strict.search(&source, "greatest estate manager").await.unwrap().is_empty());

    let loose = FlameComicsAdapter::new(AdapterContext::from_config(fetcher.clone(), &config));
    let results = loose.search(&source, "greatest estate manager").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url, "https://flamecomics.xyz/series/7");
    assert!(fetcher.requests().iter().all(|(_, direct)| !direct));
}

#[tokio::test]
async fn test_chapter_lookup_routes_by_host() {
    let fetcher = RecordingFetcher::serving(vec![
        ("api.mangadex.org/chapter", CHAPTER_FEED),
        (
            "manhuaus.com/manga/solo-leveling",
            r#"<ul><li><a href="https://manhuaus.com/manga/solo-leveling/chapter-201/">Chapter 201</a></li></ul>"#,
        ),
    ]);
    let ctx = AdapterContext::new(fetcher.clone());
    let aggregator = Aggregator::new(
        SourceRegistry::builtin().unwrap(),
        default_adapters(&ctx),
        &AggregatorConfig::default(),
    );

    let api = aggregator
        .get_latest_chapter(&format!("https://mangadex.org/title/{}", SOLO_ID))
        .await;
    assert_eq!(api.chapter, Some(200.0));
    let html = aggregator
        .get_latest_chapter("https://manhuaus.com/manga/solo-leveling/")
        .await;
    assert_eq!(html.chapter, Some(201.0));

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].1, "API source is fetched directly");
    assert!(!requests[1].1, "HTML sources go through the relays");
}

#[test]
fn test_custom_loose_source_resolves_to_loose_adapter() {
    let def = SourceDefinition::new(
        "mysite",
        "My Site",
        "https://mysite.example",
        "https://mysite.example/?s={query}",
        AdapterKind::LooseHtml,
    );
    let ctx = AdapterContext::new(RecordingFetcher::serving(Vec::new()));
    assert!(default_adapters(&ctx).contains_key(&def.adapter));
}
