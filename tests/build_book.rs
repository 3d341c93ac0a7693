use refbook::build::{build_book, check_book};
use refbook::config::Config;
use refbook::diagnostics::DiagnosticKind;
use std::fs;
use std::path::Path;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const TEMPLATE: &str = concat!(
    "<title>{{ .page.title }} - {{ .book.title }}</title>",
    "{{ if .prev }}<a class=\"prev\" href=\"{{ .prev.url }}\">",
    "{{ .prev.title }}</a>{{ end }}",
    "{{ if .next }}<a class=\"next\" href=\"{{ .next.url }}\">",
    "{{ .next.title }}</a>{{ end }}",
    "<main>{{ .page.body }}</main>",
);

fn write(root: &Path, relpath: &str, contents: &str) -> Result<()> {
    let path = root.join(relpath);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

fn project(root: &Path) -> Result<Config> {
    write(
        root,
        "book.yaml",
        "title: Ruby Reference\nsite_root: https://example.org/ref/\n",
    )?;
    write(root, "theme/theme.yaml", "page_template: [base.html]\n")?;
    write(root, "theme/base.html", TEMPLATE)?;
    write(
        root,
        "content/intro.md",
        "---\ntitle: Introduction\nnext: language\n---\n\
         # Getting started\n\nSee [the syntax](ref:language#syntax).\n",
    )?;
    write(
        root,
        "content/language.md",
        "---\ntitle: Language\nprev: intro\n---\n\
         ## Syntax\n\nSee [the console](io/console.md).\n",
    )?;
    write(
        root,
        "content/io/console.md",
        "---\ntitle: IO::Console\n---\nExtends [IO](ref:io/console/IO).\n",
    )?;
    write(root, "static/style.css", "body { margin: 0 }")?;
    Ok(Config::from_directory(&root.join("content"))?)
}

#[test]
fn test_build_book() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = project(dir.path())?;
    let output = dir.path().join("_site");

    let report = build_book(&config, &output)?;
    assert_eq!(3, report.documents);
    assert_eq!(3, report.pages);

    let intro = fs::read_to_string(output.join("intro.html"))?;
    assert!(intro.contains("<title>Introduction - Ruby Reference</title>"));
    assert!(intro.contains(r#"<h1 id="getting-started">Getting started</h1>"#));
    assert!(intro.contains(concat!(
        r#"<a href="https://example.org/ref/language.html#syntax">"#,
        "the syntax</a>",
    )));
    assert!(intro.contains(concat!(
        r#"<a class="next" href="https://example.org/ref/language.html">"#,
        "Language</a>",
    )));
    assert!(!intro.contains(r#"class="prev""#));

    let language = fs::read_to_string(output.join("language.html"))?;
    assert!(language.contains(r#"<h2 id="syntax">Syntax</h2>"#));
    assert!(language.contains(concat!(
        r#"<a href="https://example.org/ref/io/console.html">"#,
        "the console</a>",
    )));
    assert!(language.contains(concat!(
        r#"<a class="prev" href="https://example.org/ref/intro.html">"#,
        "Introduction</a>",
    )));

    let console = fs::read_to_string(output.join("io/console.html"))?;
    assert!(console.contains(concat!(
        r#"<span class="unresolved-reference" title="ref:io/console/IO">"#,
        "IO</span>",
    )));

    assert_eq!(
        "body { margin: 0 }",
        fs::read_to_string(output.join("static/style.css"))?
    );

    let diagnostics: Vec<_> = report.diagnostics.iter().collect();
    assert_eq!(1, diagnostics.len());
    assert_eq!("io/console", diagnostics[0].document.as_str());
    assert_eq!(
        DiagnosticKind::UnresolvedReference {
            target: "io/console/IO".to_owned()
        },
        diagnostics[0].kind
    );
    assert!(report.diagnostics.has_errors());
    Ok(())
}

#[test]
fn test_check_book_needs_no_theme() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = project(dir.path())?;
    fs::remove_dir_all(dir.path().join("theme"))?;

    let report = check_book(&config)?;
    assert_eq!(3, report.documents);
    assert_eq!(0, report.pages);
    assert_eq!(1, report.diagnostics.len());
    assert!(!dir.path().join("_site").exists());

    let mut out = Vec::new();
    report.diagnostics.write_report(&mut out)?;
    assert_eq!(
        "error: io/console: unresolved reference `io/console/IO`\n\
         1 error, 0 warnings\n",
        String::from_utf8(out)?
    );
    Ok(())
}

#[test]
fn test_malformed_document_is_skipped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = project(dir.path())?;
    write(dir.path(), "content/broken.md", "no front-matter here\n")?;

    let report = check_book(&config)?;
    assert_eq!(3, report.documents);
    assert!(report.diagnostics.iter().any(|d| d.document.as_str() == "broken"
        && matches!(d.kind, DiagnosticKind::MissingFrontMatter { .. })));
    Ok(())
}

#[test]
fn test_build_escapes_urls() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = project(dir.path())?;
    write(
        dir.path(),
        "content/defined?.md",
        "---\ntitle: defined?\n---\n\
         Back to [the language](language.md?from=defined).\n",
    )?;
    write(
        dir.path(),
        "content/io/my page.md",
        "---\ntitle: My page\n---\nSee [defined?](../defined%3F.md).\n",
    )?;
    let output = dir.path().join("_site");

    let report = build_book(&config, &output)?;
    assert_eq!(5, report.pages);
    assert_eq!(1, report.diagnostics.len());

    let defined = fs::read_to_string(output.join("defined?.html"))?;
    assert!(defined.contains(
        r#"<a href="https://example.org/ref/language.html">the language</a>"#
    ));
    let page = fs::read_to_string(output.join("io/my page.html"))?;
    assert!(page.contains(
        r#"<a href="https://example.org/ref/defined%3F.html">defined?</a>"#
    ));
    Ok(())
}
