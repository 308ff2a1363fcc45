use std::sync::Arc;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use scraper::Html;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{info, warn};

use crate::catalog::{self, CatalogEntry, DictionaryPage};
use crate::config::Config;
use crate::db::{PutOutcome, StoredTranslation, TranslationStore};
use crate::fetch::{self, FetchOutcome, PageFetcher};

/// Progress of one dictionary crawl.
#[derive(Debug)]
pub struct CrawlTarget {
    pub dictionary_name: String,
    pub base_link: String,
    pub target_count: i64,
    pub handled_count: i64,
}

impl CrawlTarget {
    pub fn from_entry(entry: CatalogEntry, host: &str) -> Result<Self> {
        Ok(Self {
            dictionary_name: entry.name,
            base_link: fetch::resolve(host, &entry.link)?,
            target_count: entry.word_count,
            handled_count: 0,
        })
    }
}

/// Why a dictionary crawl stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlEnd {
    /// Stored rows reached the catalog's advertised count.
    TargetReached,
    /// The next-page chain ran out first.
    PagesExhausted,
    /// A page was lost to a timeout or transport failure.
    LostPage,
}

#[derive(Debug)]
pub struct DictionaryReport {
    pub name: String,
    pub handled: i64,
    pub target: i64,
    pub end: CrawlEnd,
}

#[derive(Debug, Default)]
pub struct CrawlStats {
    pub dictionaries: usize,
    pub reached: usize,
    pub exhausted: usize,
    pub lost: usize,
    pub stored: i64,
}

/// Page through one dictionary, storing rows until enough accepted rows
/// arrive or the pages run out. Only accepted (novel) rows count toward the
/// target, so re-crawls pick up where the stored data left off.
pub async fn crawl_dictionary<F, S>(
    fetcher: &F,
    store: &Mutex<S>,
    mut target: CrawlTarget,
    host: &str,
) -> Result<DictionaryReport>
where
    F: PageFetcher,
    S: TranslationStore,
{
    let mut url = target.base_link.clone();
    loop {
        let page = match fetcher.fetch_page(&url).await {
            FetchOutcome::Success(body) => parse_page(&body),
            FetchOutcome::Timeout(lost) => {
                warn!("Timeout on {}, quarantining", lost);
                store.lock().await.quarantine(&lost, "timeout")?;
                return Ok(report(target, CrawlEnd::LostPage));
            }
            FetchOutcome::Failed(reason) => {
                warn!(
                    "Fetch failed for {} on {}: {}",
                    target.dictionary_name, url, reason
                );
                return Ok(report(target, CrawlEnd::LostPage));
            }
        };

        let mut reached = false;
        {
            let mut store = store.lock().await;
            for row in page.rows {
                let stored = StoredTranslation {
                    dictionary: target.dictionary_name.clone(),
                    word: row.word,
                    translation: row.translation,
                    author_name: row.author_name,
                    author_link: row.author_link,
                };
                match store.put(&stored) {
                    Ok(PutOutcome::Accepted) => target.handled_count += 1,
                    Ok(PutOutcome::Rejected) => {}
                    Err(e) => warn!("Store refused '{}': {}", stored.word, e),
                }
                if target.handled_count >= target.target_count {
                    reached = true;
                    break;
                }
            }
        }
        if reached {
            return Ok(report(target, CrawlEnd::TargetReached));
        }

        match page.next_link {
            Some(link) => url = fetch::resolve(host, &link)?,
            None => return Ok(report(target, CrawlEnd::PagesExhausted)),
        }
    }
}

// Html is not Send, so pages are parsed inside a plain fn and only owned
// rows cross back to the async side.
fn parse_page(body: &str) -> DictionaryPage {
    let doc = Html::parse_document(body);
    catalog::parse_dictionary_page(&doc)
}

fn report(target: CrawlTarget, end: CrawlEnd) -> DictionaryReport {
    DictionaryReport {
        name: target.dictionary_name,
        handled: target.handled_count,
        target: target.target_count,
        end,
    }
}

/// Fetch the dictionary catalog, then crawl every listed dictionary with
/// bounded concurrency, streaming per-dictionary reports back as they finish.
pub async fn crawl_all<F, S>(
    fetcher: Arc<F>,
    store: Arc<Mutex<S>>,
    config: &Config,
) -> Result<CrawlStats>
where
    F: PageFetcher + 'static,
    S: TranslationStore + Send + 'static,
{
    let catalog_url = fetch::catalog_url(&config.host);
    let entries = match fetcher.fetch_page(&catalog_url).await {
        FetchOutcome::Success(body) => {
            let doc = Html::parse_document(&body);
            catalog::parse_catalog(&doc)
        }
        FetchOutcome::Timeout(lost) => {
            store.lock().await.quarantine(&lost, "timeout")?;
            bail!("Catalog fetch timed out: {}", lost);
        }
        FetchOutcome::Failed(reason) => bail!("Catalog fetch failed: {}", reason),
    };
    if entries.is_empty() {
        bail!("Catalog page listed no dictionaries");
    }
    info!("Catalog lists {} dictionaries", entries.len());

    let total = entries.len();
    let semaphore = Arc::new(Semaphore::new(config.concurrency));

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let (tx, mut rx) = mpsc::channel::<DictionaryReport>(config.concurrency * 2);

    for entry in entries {
        let fetcher = Arc::clone(&fetcher);
        let store = Arc::clone(&store);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let host = config.host.clone();
        tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let name = entry.name.clone();
            let target = match CrawlTarget::from_entry(entry, &host) {
                Ok(target) => target,
                Err(e) => {
                    warn!("Bad catalog link for {}: {}", name, e);
                    return;
                }
            };
            match crawl_dictionary(fetcher.as_ref(), store.as_ref(), target, &host).await {
                Ok(rep) => {
                    let _ = tx.send(rep).await;
                }
                Err(e) => warn!("Crawl failed for {}: {}", name, e),
            }
        });
    }
    drop(tx);

    let mut stats = CrawlStats {
        dictionaries: total,
        ..CrawlStats::default()
    };
    while let Some(rep) = rx.recv().await {
        stats.stored += rep.handled;
        match rep.end {
            CrawlEnd::TargetReached => stats.reached += 1,
            CrawlEnd::PagesExhausted => {
                stats.exhausted += 1;
                info!("{}: pages ran out at {}/{}", rep.name, rep.handled, rep.target);
            }
            CrawlEnd::LostPage => {
                stats.lost += 1;
                warn!("{}: page lost at {}/{}", rep.name, rep.handled, rep.target);
            }
        }
        pb.set_message(rep.name);
        pb.inc(1);
    }
    pb.finish_and_clear();

    store.lock().await.flush()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex as StdMutex;

    use crate::db::MemoryStore;

    struct ScriptedFetcher {
        bodies: HashMap<String, String>,
        timeouts: HashSet<String>,
        calls: StdMutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn new(bodies: HashMap<String, String>, timeouts: HashSet<String>) -> Self {
            Self {
                bodies,
                timeouts,
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PageFetcher for ScriptedFetcher {
        fn fetch_page(&self, url: &str) -> impl std::future::Future<Output = FetchOutcome> + Send {
            self.calls.lock().unwrap().push(url.to_string());
            let outcome = if self.timeouts.contains(url) {
                FetchOutcome::Timeout(url.to_string())
            } else if let Some(body) = self.bodies.get(url) {
                FetchOutcome::Success(body.clone())
            } else {
                FetchOutcome::Failed(format!("no page scripted for {}", url))
            };
            async move { outcome }
        }
    }

    fn page_html(words: &[&str], next: Option<&str>) -> String {
        let mut rows = String::new();
        for word in words {
            rows.push_str(&format!(
                "<tr><td class=\"termsforsubject\">{}</td>\
                 <td class=\"termsforsubject\">перевод</td></tr>",
                word
            ));
        }
        let next_anchor = next
            .map(|link| format!("<a href=\"{}\">&gt;&gt;</a>", link))
            .unwrap_or_default();
        format!(
            "<html><body><table>{}</table>{}</body></html>",
            rows, next_anchor
        )
    }

    fn target(count: i64) -> CrawlTarget {
        CrawlTarget {
            dictionary_name: "авиац.".to_string(),
            base_link: "https://test.example/dict".to_string(),
            target_count: count,
            handled_count: 0,
        }
    }

    const HOST: &str = "https://test.example";

    #[tokio::test]
    async fn stops_mid_page_once_target_reached() {
        let mut bodies = HashMap::new();
        bodies.insert(
            "https://test.example/dict".to_string(),
            page_html(&["w1", "w2", "w3"], Some("/dict2")),
        );
        bodies.insert(
            "https://test.example/dict2".to_string(),
            page_html(&["w4", "w5", "w6"], Some("/dict3")),
        );
        bodies.insert(
            "https://test.example/dict3".to_string(),
            page_html(&["w7"], None),
        );
        let fetcher = ScriptedFetcher::new(bodies, HashSet::new());
        let store = Mutex::new(MemoryStore::new());

        let rep = crawl_dictionary(&fetcher, &store, target(5), HOST)
            .await
            .unwrap();
        assert_eq!(rep.end, CrawlEnd::TargetReached);
        assert_eq!(rep.handled, 5);

        let store = store.into_inner();
        assert_eq!(store.len(), 5);
        assert!(store.contains("авиац.", "w5"));
        assert!(!store.contains("авиац.", "w6"));
        assert_eq!(
            fetcher.calls(),
            vec![
                "https://test.example/dict".to_string(),
                "https://test.example/dict2".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn timeout_quarantines_without_advancing() {
        let fetcher = ScriptedFetcher::new(
            HashMap::new(),
            HashSet::from(["https://test.example/dict".to_string()]),
        );
        let store = Mutex::new(MemoryStore::new());

        let rep = crawl_dictionary(&fetcher, &store, target(3), HOST)
            .await
            .unwrap();
        assert_eq!(rep.end, CrawlEnd::LostPage);
        assert_eq!(rep.handled, 0);

        let store = store.into_inner();
        assert_eq!(store.len(), 0);
        assert_eq!(
            store.quarantined,
            vec![("https://test.example/dict".to_string(), "timeout".to_string())]
        );
    }

    #[tokio::test]
    async fn exhausted_pages_reported() {
        let mut bodies = HashMap::new();
        bodies.insert(
            "https://test.example/dict".to_string(),
            page_html(&["w1", "w2"], None),
        );
        let fetcher = ScriptedFetcher::new(bodies, HashSet::new());
        let store = Mutex::new(MemoryStore::new());

        let rep = crawl_dictionary(&fetcher, &store, target(10), HOST)
            .await
            .unwrap();
        assert_eq!(rep.end, CrawlEnd::PagesExhausted);
        assert_eq!(rep.handled, 2);
    }

    #[tokio::test]
    async fn duplicates_do_not_count_toward_target() {
        let mut bodies = HashMap::new();
        bodies.insert(
            "https://test.example/dict".to_string(),
            page_html(&["apron", "apron", "beacon"], None),
        );
        let fetcher = ScriptedFetcher::new(bodies, HashSet::new());
        let store = Mutex::new(MemoryStore::new());

        let rep = crawl_dictionary(&fetcher, &store, target(5), HOST)
            .await
            .unwrap();
        assert_eq!(rep.end, CrawlEnd::PagesExhausted);
        assert_eq!(rep.handled, 2);
        assert_eq!(store.into_inner().len(), 2);
    }

    struct FailingStore {
        inner: MemoryStore,
        poison_word: String,
    }

    impl TranslationStore for FailingStore {
        fn put(&mut self, row: &StoredTranslation) -> Result<PutOutcome> {
            if row.word == self.poison_word {
                anyhow::bail!("disk full");
            }
            self.inner.put(row)
        }

        fn quarantine(&mut self, url: &str, reason: &str) -> Result<()> {
            self.inner.quarantine(url, reason)
        }
    }

    #[tokio::test]
    async fn store_error_counts_as_rejection() {
        let mut bodies = HashMap::new();
        bodies.insert(
            "https://test.example/dict".to_string(),
            page_html(&["w1", "bad", "w2"], None),
        );
        let fetcher = ScriptedFetcher::new(bodies, HashSet::new());
        let store = Mutex::new(FailingStore {
            inner: MemoryStore::new(),
            poison_word: "bad".to_string(),
        });

        let rep = crawl_dictionary(&fetcher, &store, target(5), HOST)
            .await
            .unwrap();
        assert_eq!(rep.end, CrawlEnd::PagesExhausted);
        assert_eq!(rep.handled, 2);

        let store = store.into_inner();
        assert!(store.inner.contains("авиац.", "w1"));
        assert!(store.inner.contains("авиац.", "w2"));
        assert!(!store.inner.contains("авиац.", "bad"));
    }

    #[tokio::test]
    async fn crawl_all_walks_the_catalog() {
        let catalog = "<html><body><table>\
             <tr><td><a href=\"/all\">Вся лексика</a></td><td>103445</td></tr>\
             <tr><td><a href=\"/dict_a\">Авиация</a></td><td>2</td></tr>\
             <tr><td><a href=\"/about\">О сайте</a></td><td></td></tr>\
             </table></body></html>";
        let mut bodies = HashMap::new();
        bodies.insert(fetch::catalog_url(HOST), catalog.to_string());
        bodies.insert(
            "https://test.example/dict_a".to_string(),
            page_html(&["apron", "beacon"], None),
        );
        let fetcher = Arc::new(ScriptedFetcher::new(bodies, HashSet::new()));
        let store = Arc::new(Mutex::new(MemoryStore::new()));
        let config = Config {
            host: HOST.to_string(),
            concurrency: 2,
            ..Config::default()
        };

        let stats = crawl_all(Arc::clone(&fetcher), Arc::clone(&store), &config)
            .await
            .unwrap();
        assert_eq!(stats.dictionaries, 1);
        assert_eq!(stats.reached, 1);
        assert_eq!(stats.stored, 2);

        let store = store.lock().await;
        assert!(store.contains("Авиация", "apron"));
        assert!(store.contains("Авиация", "beacon"));
    }

    #[tokio::test]
    async fn catalog_timeout_fails_the_crawl() {
        let fetcher = Arc::new(ScriptedFetcher::new(
            HashMap::new(),
            HashSet::from([fetch::catalog_url(HOST)]),
        ));
        let store = Arc::new(Mutex::new(MemoryStore::new()));
        let config = Config {
            host: HOST.to_string(),
            ..Config::default()
        };

        let result = crawl_all(fetcher, Arc::clone(&store), &config).await;
        assert!(result.is_err());
        assert_eq!(store.lock().await.quarantined.len(), 1);
    }
}
