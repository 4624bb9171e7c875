use scraper::{Html, Selector};
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{debug, info, warn};

use ai_client::truncate_to_char_boundary;
use rankings_common::{RankingError, Result};

/// Page furniture removed before main-content extraction.
pub const NOISE_SELECTORS: &[&str] = &[
    "nav",
    "footer",
    "script",
    "style",
    "iframe",
    ".related-content",
    ".ob-widget",
    ".taboola",
    ".advertisement",
    ".ad-container",
];

/// Clean article text ready for the extractor.
#[derive(Debug, Clone)]
pub struct NormalizedArticle {
    pub text: String,
    pub truncated: bool,
}

/// Drop every element matching [`NOISE_SELECTORS`] and reserialize the document.
pub fn strip_noise(html: &str) -> String {
    let mut document = Html::parse_document(html);

    let mut doomed = Vec::new();
    for raw in NOISE_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        doomed.extend(document.select(&selector).map(|el| el.id()));
    }

    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    document.html()
}

fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(body) = Selector::parse("body") else {
        return String::new();
    };
    document
        .select(&body)
        .flat_map(|el| el.text())
        .collect::<String>()
}

/// Strip noise, isolate the main content as Markdown, cap at `max_chars`.
///
/// Fails with [`RankingError::ExtractionEmpty`] when no article body survives.
pub fn normalize(html: &str, url: &str, max_chars: usize) -> Result<NormalizedArticle> {
    let cleaned = strip_noise(html);

    if visible_text(&cleaned).trim().is_empty() {
        warn!(url, "Nothing left after stripping page furniture");
        return Err(RankingError::ExtractionEmpty(url.to_string()));
    }

    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: cleaned.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };

    let text = transform_content_input(input, &config);
    let text = text.trim();

    if text.is_empty() {
        warn!(url, "Empty content after Readability extraction");
        return Err(RankingError::ExtractionEmpty(url.to_string()));
    }

    let cut = truncate_to_char_boundary(text, max_chars);
    let truncated = cut.len() < text.len();
    if truncated {
        debug!(url, max_chars, "Article text truncated");
    }

    info!(url, chars = cut.chars().count(), truncated, "Normalized article");
    Ok(NormalizedArticle {
        text: cut.to_string(),
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<html><head><style>body { color: red }</style></head>
<body>
  <nav><a href="/">Home</a> <a href="/nfl">NFL Scores</a></nav>
  <article>
    <h1>NFL Power Rankings, Week 12</h1>
    <p>The Kansas City Chiefs stay on top after another late comeback. Patrick Mahomes
    did what he always does in the fourth quarter and the defense held when it mattered.</p>
    <p>The Detroit Lions slide into the second spot following a dominant win on the road,
    with the offensive line paving the way for more than two hundred rushing yards.</p>
    <p>The Buffalo Bills round out the top three after a bye week spent getting healthy.</p>
  </article>
  <div class="related-content">Read more: Eagles trade rumors</div>
  <div class="taboola">You won't believe these Niners stats</div>
  <iframe src="https://ads.example.com"></iframe>
  <script>window.dataLayer = [];</script>
  <footer>Copyright Example Media</footer>
</body></html>"#;

    #[test]
    fn strip_noise_removes_denylisted_elements() {
        let cleaned = strip_noise(ARTICLE);
        assert!(cleaned.contains("Kansas City Chiefs"));
        assert!(!cleaned.contains("NFL Scores"));
        assert!(!cleaned.contains("Eagles trade rumors"));
        assert!(!cleaned.contains("Niners stats"));
        assert!(!cleaned.contains("dataLayer"));
        assert!(!cleaned.contains("Copyright Example Media"));
        assert!(!cleaned.contains("<iframe"));
    }

    #[test]
    fn furniture_only_page_is_empty() {
        let html = "<html><body><nav>Menu</nav><footer>About us</footer>\
                    <script>var x = 1;</script></body></html>";
        let err = normalize(html, "https://example.com/rankings", 1000).unwrap_err();
        assert!(matches!(err, RankingError::ExtractionEmpty(_)));
    }

    #[test]
    fn normalize_keeps_article_body() {
        let article = normalize(ARTICLE, "https://example.com/power-rankings", 60_000).unwrap();
        assert!(article.text.contains("Chiefs"));
        assert!(!article.text.contains("dataLayer"));
        assert!(!article.truncated);
    }

    #[test]
    fn normalize_caps_length() {
        let article = normalize(ARTICLE, "https://example.com/power-rankings", 40).unwrap();
        assert_eq!(article.text.chars().count(), 40);
        assert!(article.truncated);
    }
}
