//! Example: Scrape a few pages and show which tier served each
//!
//! Run with: cargo run -p scrapekit --example scrape_urls
//!
//! Pages that need JavaScript are rendered in Chrome/Chromium when one is
//! installed (or pointed to by SCRAPEKIT_CHROME_PATH).

use scrapekit::{ContentRecord, Pipeline, RuleRegistry, ScrapeOptions};

/// Page to scrape and what to look for in the result
struct Case {
    url: &'static str,
    description: &'static str,
    rule_set: Option<&'static str>,
    expect_contains: &'static str,
}

const CASES: &[Case] = &[
    Case {
        url: "https://example.com",
        description: "Static HTML page",
        rule_set: None,
        expect_contains: "Example Domain",
    },
    Case {
        url: "https://httpbin.org/html",
        description: "Long-form article",
        rule_set: Some("blog"),
        expect_contains: "Herman Melville",
    },
    Case {
        url: "data:text/html,<title>Inline</title><p id='x'></p><script>document.getElementById('x').textContent='Rendered by script'</script>",
        description: "Inline document (browser only)",
        rule_set: None,
        expect_contains: "Rendered by script",
    },
];

#[tokio::main]
async fn main() {
    println!("ScrapeKit Examples");
    println!("==================\n");

    let pipeline = Pipeline::with_defaults();
    let rules = RuleRegistry::with_builtins();
    let mut failed = 0;

    for (i, case) in CASES.iter().enumerate() {
        println!("{}. {}", i + 1, case.description);
        println!("   URL: {}", preview(case.url, 60));

        let record = match pipeline.fetch(case.url, &ScrapeOptions::new()).await {
            Ok(record) => record,
            Err(e) => {
                println!("   Error: {}\n", e);
                failed += 1;
                continue;
            }
        };
        let record = match case.rule_set {
            Some(name) => match rules.apply(name, &record) {
                Ok(record) => record,
                Err(e) => {
                    println!("   Error: {}\n", e);
                    failed += 1;
                    continue;
                }
            },
            None => record,
        };

        print_summary(&record);
        if record.body_text.contains(case.expect_contains) {
            println!("   ✓ PASS\n");
        } else {
            println!("   ✗ FAIL (missing '{}')\n", case.expect_contains);
            failed += 1;
        }
    }

    pipeline.shutdown().await;

    println!("==================");
    println!("{} of {} passed", CASES.len() - failed, CASES.len());
    if failed > 0 {
        std::process::exit(1);
    }
}

fn print_summary(record: &ContentRecord) {
    println!("   Tier: {}", record.retrieved_via);
    println!("   Title: {}", record.title);
    println!("   Links: {}, images: {}", record.links.len(), record.images.len());
    println!("   Preview: {}", preview(&record.body_text, 100));
}

fn preview(text: &str, max: usize) -> String {
    let head: String = text.chars().take(max).collect::<String>().replace('\n', " ");
    if text.chars().count() > max {
        format!("{head}...")
    } else {
        head
    }
}
