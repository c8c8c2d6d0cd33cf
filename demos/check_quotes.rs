/// Example: Check the contracts of a small quotes spider
///
/// The site is served from memory, so the example runs offline. One callback
/// is deliberately wrong to show a failure block in the report.
///
/// Usage:
///   cargo run --example check_quotes -- --list
///   cargo run --example check_quotes -- -v
///   cargo run --example check_quotes -- -s spider_contracts.scrapes=null quotes

use clap::Parser;
use serde_json::json;
use spider_check::cli::{CheckArgs, CheckRunner};
use spider_check::contracts::ContractRegistry;
use spider_check::crawl::MemoryFetcher;
use spider_check::spider::{Callback, Invocation, Output, Request, Spider, SpiderError, SpiderLoader};
use std::process::ExitCode;
use std::sync::Arc;

const QUOTES_PAGE: &str = r#"
<div class="quote"><span class="text">The world as we have created it is a process of our thinking.</span><small class="author">Albert Einstein</small></div>
<div class="quote"><span class="text">It is our choices that show what we truly are.</span><small class="author">J.K. Rowling</small></div>
<li class="next"><a href="/page/2/">Next</a></li>
"#;

const AUTHOR_PAGE: &str = r#"
<h3 class="author-title">Albert Einstein</h3>
<span class="author-born-date">March 14, 1879</span>
"#;

/// Text between `open` and the next `close`, for each occurrence
fn between<'a>(body: &'a str, open: &str, close: &str) -> Vec<&'a str> {
    body.split(open)
        .skip(1)
        .filter_map(|rest| rest.split(close).next())
        .collect()
}

struct QuotesSpider;

impl QuotesSpider {
    fn parse_page(&self, inv: &Invocation<'_>) -> Vec<Output> {
        let body = inv.response.text();
        let texts = between(body, r#"<span class="text">"#, "</span>");
        let authors = between(body, r#"<small class="author">"#, "</small>");

        let mut out: Vec<Output> = texts
            .iter()
            .zip(authors.iter())
            .map(|(text, author)| Output::item(json!({"text": text, "author": author})))
            .collect();

        for href in between(body, r#"<li class="next"><a href=""#, "\"") {
            out.push(Output::Request(Request::new(
                format!("http://quotes.example{}", href),
                "parse",
            )));
        }
        out
    }

    fn parse_author(&self, inv: &Invocation<'_>) -> Vec<Output> {
        let body = inv.response.text();
        let name = between(body, r#"<h3 class="author-title">"#, "</h3>");
        // the page has no description, so the `scrapes` contract below fails
        let description = between(body, r#"<div class="author-description">"#, "</div>");

        let mut item = serde_json::Map::new();
        if let Some(name) = name.first() {
            item.insert("name".to_string(), json!(name));
        }
        if let Some(description) = description.first() {
            item.insert("description".to_string(), json!(description));
        }
        vec![Output::Item(item)]
    }
}

impl Spider for QuotesSpider {
    fn name(&self) -> &str {
        "quotes"
    }

    fn callbacks(&self) -> Vec<Callback> {
        vec![
            Callback::new("parse")
                .with_url("http://quotes.example/page/1/")
                .expect("returns", &["items", "1", "10"])
                .expect("scrapes", &["text", "author"]),
            Callback::new("parse_author")
                .with_url("http://quotes.example/author/Albert-Einstein/")
                .expect("scrapes", &["name", "description"]),
        ]
    }

    fn start_requests(&self) -> Vec<Request> {
        vec![Request::new("http://quotes.example/page/1/", "parse")]
    }

    fn parse(&self, inv: &Invocation<'_>) -> Result<Vec<Output>, SpiderError> {
        match inv.callback {
            "parse" => Ok(self.parse_page(inv)),
            "parse_author" => Ok(self.parse_author(inv)),
            other => Err(SpiderError::UnknownCallback(other.to_string())),
        }
    }
}

/// Spider without contracts, shown by `--list --verbose` only
struct SitemapSpider;

impl Spider for SitemapSpider {
    fn name(&self) -> &str {
        "sitemap"
    }

    fn callbacks(&self) -> Vec<Callback> {
        vec![Callback::new("parse")]
    }

    fn parse(&self, _: &Invocation<'_>) -> Result<Vec<Output>, SpiderError> {
        Ok(Vec::new())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut spiders = SpiderLoader::new();
    spiders
        .register_spider(Arc::new(QuotesSpider))
        .register_spider(Arc::new(SitemapSpider));

    let contracts = ContractRegistry::with_builtins();

    let site = MemoryFetcher::new()
        .route("http://quotes.example/page/1/", 200, QUOTES_PAGE)
        .route("http://quotes.example/author/Albert-Einstein/", 200, AUTHOR_PAGE);

    let runner = CheckRunner::new(&spiders, &contracts).with_fetcher(Arc::new(site));
    runner.run(CheckArgs::parse()).await
}
