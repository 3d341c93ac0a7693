use crate::htmlrenderer::HtmlRenderer;
use crate::reference::{LinkMap, Resolution};
use pulldown_cmark::escape::{escape_html, StrWrite};
use pulldown_cmark::*;
use std::collections::HashMap;
use std::io;

/// The markdown extensions enabled for every document.
pub fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Returns the destination of every link (not image) in `markdown`, in
/// document order.
pub fn link_destinations(markdown: &str) -> Vec<String> {
    Parser::new_ext(markdown, options())
        .filter_map(|ev| match ev {
            Event::Start(Tag::Link(LinkType::Email, _, _)) => None,
            Event::Start(Tag::Link(_, dest, _)) => Some(dest.to_string()),
            _ => None,
        })
        .collect()
}

/// Returns the anchor for every heading in `markdown`, in document order.
/// These are the `id` attributes [`to_html`] puts on the headings.
pub fn heading_anchors(markdown: &str) -> Vec<String> {
    let events: Vec<Event> = Parser::new_ext(markdown, options()).collect();
    heading_ids(&events)
}

// An anchor is the slugified heading text. Repeats get `-1`, `-2`, ...
// suffixes in document order; headings without any sluggable text are
// `section`.
fn heading_ids(events: &[Event]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut ids = Vec::new();
    let mut text: Option<String> = None;
    for ev in events {
        match ev {
            Event::Start(Tag::Heading(_)) => text = Some(String::new()),
            Event::End(Tag::Heading(_)) => {
                if let Some(text) = text.take() {
                    let base = match slug::slugify(&text) {
                        slug if slug.is_empty() => String::from("section"),
                        slug => slug,
                    };
                    let count = seen.entry(base.clone()).or_insert(0);
                    ids.push(match *count {
                        0 => base,
                        n => format!("{}-{}", base, n),
                    });
                    *count += 1;
                }
            }
            Event::Text(s) | Event::Code(s) => {
                if let Some(text) = text.as_mut() {
                    text.push_str(s);
                }
            }
            _ => {}
        }
    }
    ids
}

/// Converts markdown to HTML, writing the result into `w`.
///
/// * `markdown` is the document body.
/// * `links` holds the resolutions for the document's cross-references.
///   Resolved ones get their output URL as the link destination; unresolved
///   ones have their link text wrapped in a
///   `<span class="unresolved-reference">` instead of an anchor. Other links
///   are written as-is.
pub fn to_html<W: StrWrite>(
    w: &mut W,
    markdown: &str,
    links: Option<&LinkMap>,
) -> io::Result<()> {
    let events: Vec<Event> = Parser::new_ext(markdown, options()).collect();
    let event_converter = EventConverter { links };
    let mut html_renderer = HtmlRenderer::new(heading_ids(&events));
    for ev in events {
        html_renderer.on_event(w, event_converter.convert(ev)?)?;
    }
    Ok(())
}

struct EventConverter<'a> {
    links: Option<&'a LinkMap>,
}

impl<'a> EventConverter<'a> {
    fn lookup(&self, destination: &str) -> Option<&'a Resolution> {
        self.links.and_then(|links| links.get(destination))
    }

    // Cross-reference links (links from one document *to* another) need to
    // be converted from their source form (`ref:io/IO`, `../io.md`) to the
    // target's output URL. Start and end tags both carry the destination, so
    // each is converted independently.
    fn convert<'b>(&self, ev: Event<'b>) -> io::Result<Event<'b>> {
        Ok(match ev {
            Event::Start(Tag::Link(link, url, title)) => match self.lookup(&url)
            {
                Some(Resolution::Resolved { href, .. }) => {
                    let href = CowStr::from(href.clone());
                    Event::Start(Tag::Link(link, href, title))
                }
                Some(Resolution::Unresolved { .. }) => {
                    let mut html = String::from(
                        r#"<span class="unresolved-reference" title=""#,
                    );
                    escape_html(&mut html, &url)?;
                    html.push_str(r#"">"#);
                    Event::Html(CowStr::from(html))
                }
                None => Event::Start(Tag::Link(link, url, title)),
            },
            Event::End(Tag::Link(link, url, title)) => match self.lookup(&url) {
                Some(Resolution::Unresolved { .. }) => {
                    Event::Html(CowStr::Borrowed("</span>"))
                }
                _ => Event::End(Tag::Link(link, url, title)),
            },
            _ => ev,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::DocId;

    fn render(markdown: &str, links: Option<&LinkMap>) -> String {
        let mut out = String::new();
        to_html(&mut out, markdown, links).unwrap();
        out
    }

    #[test]
    fn test_heading_anchors() {
        assert_eq!(
            vec![
                "io-read",
                "read-lines",
                "read-lines-1",
                "section",
                "io-read-1"
            ],
            heading_anchors(
                "# IO#read\n## Read `lines`\n## Read lines\n## !!!\n# IO read\n"
            )
        );
    }

    #[test]
    fn test_link_destinations() {
        assert_eq!(
            vec!["ref:a", "b.md", "https://example.org"],
            link_destinations(
                "[a](ref:a) ![img](c.md) [b](b.md) \
                 <https://example.org> <me@example.org>"
            )
        );
    }

    #[test]
    fn test_to_html_heading_ids() {
        assert_eq!(
            "<h1 id=\"intro\">Intro</h1><h2 id=\"intro-1\">Intro</h2>",
            render("# Intro\n## Intro\n", None)
        );
    }

    #[test]
    fn test_to_html_rewrites_references() {
        let mut links = LinkMap::new();
        links.insert(
            "ref:io".to_owned(),
            Resolution::Resolved {
                target: DocId::normalize("io").unwrap(),
                href: "https://example.org/ref/io.html".to_owned(),
            },
        );
        links.insert(
            "ref:gone".to_owned(),
            Resolution::Unresolved {
                target: "gone".to_owned(),
            },
        );
        assert_eq!(
            "<p><a href=\"https://example.org/ref/io.html\">IO</a> and \
             <span class=\"unresolved-reference\" title=\"ref:gone\">\
             Gone</span> and \
             <a href=\"https://ruby-lang.org\">Ruby</a></p>",
            render(
                "[IO](ref:io) and [Gone](ref:gone) and \
                 [Ruby](https://ruby-lang.org)\n",
                Some(&links)
            )
        );
    }

    #[test]
    fn test_to_html_image_alt() {
        assert_eq!(
            "<p><img src=\"a.png\" alt=\"An emphasized diagram\" \
             title=\"T\" /></p>",
            render("![An *emphasized* diagram](a.png \"T\")", None)
        );
        assert_eq!(
            "<p><img src=\"a.png\" alt=\"plain\" /></p>",
            render("![plain](a.png)", None)
        );
    }

    #[test]
    fn test_to_html_code_block() {
        assert_eq!(
            "<pre><code class=\"language-ruby\">puts 1\n</code></pre>",
            render("```ruby\nputs 1\n```\n", None)
        );
    }
}
