mod common;

use common::touch;
use mdconvert::{
    config::{MarkItDownCfg, PandocCfg},
    engine::{Engine, markitdown::MarkItDownEngine, pandoc::PandocEngine},
};

const MISSING_EXE: &str = "/nonexistent/mdconvert-test/bin/tool";

fn pandoc_at(exe: &str) -> PandocEngine {
    PandocEngine::new(&PandocCfg {
        exe: exe.into(),
        ..PandocCfg::default()
    })
}

fn markitdown_at(exe: &str) -> MarkItDownEngine {
    MarkItDownEngine::new(&MarkItDownCfg {
        exe: exe.into(),
        ..MarkItDownCfg::default()
    })
}

#[test]
fn missing_pandoc_is_unavailable_and_refuses() {
    let dir = tempfile::tempdir().unwrap();
    let input = touch(dir.path(), "doc.docx");
    let output = dir.path().join("doc.md");
    let engine = pandoc_at(MISSING_EXE);

    assert!(!engine.is_available());
    assert_eq!(engine.version(), None);
    assert!(!engine.info().available);

    let result = engine.convert(&input, &output);
    assert!(!result.is_success());
    assert_eq!(result.error().unwrap().to_string(), "Pandoc is not available");
    assert!(!output.exists());
}

#[test]
fn missing_markitdown_is_unavailable_and_refuses() {
    let dir = tempfile::tempdir().unwrap();
    let input = touch(dir.path(), "sheet.xlsx");
    let output = dir.path().join("sheet.md");
    let engine = markitdown_at(MISSING_EXE);

    assert!(!engine.is_available());
    assert_eq!(engine.version(), None);

    let result = engine.convert(&input, &output);
    assert_eq!(
        result.error().unwrap().to_string(),
        "MarkItDown is not available"
    );
    assert!(!output.exists());
}

#[cfg(unix)]
mod scripted {
    use super::*;
    use std::path::{Path, PathBuf};

    /// Writes an executable `/bin/sh` script standing in for a real tool.
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Fake pandoc: counts `--version` calls, records argv, writes the `-o`
    /// target and, when `with_media`, one file into the media directory.
    fn fake_pandoc(dir: &Path, with_media: bool) -> PathBuf {
        let counter = dir.join("version-calls");
        let argv = dir.join("argv");
        let media = if with_media {
            r#"mkdir -p "$media" && echo png > "$media/image1.png""#
        } else {
            ":"
        };
        script(
            dir,
            "pandoc",
            &format!(
                r##"if [ "$1" = "--version" ]; then
  echo call >> "{counter}"
  echo "pandoc 3.1.11"
  echo "Features: +server +lua"
  exit 0
fi
printf '%s\n' "$@" > "{argv}"
out=""
media=""
prev=""
for a in "$@"; do
  case "$a" in --extract-media=*) media="${{a#--extract-media=}}" ;; esac
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
{media}
echo "# converted" > "$out"
"##,
                counter = counter.display(),
                argv = argv.display(),
            ),
        )
    }

    fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn pandoc_passes_gfm_args_and_reports_media() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_pandoc(dir.path(), true);
        let input = touch(dir.path(), "doc.docx");
        let output = dir.path().join("out").join("doc.md");
        let engine = PandocEngine::new(&PandocCfg {
            exe: exe.display().to_string(),
            extra_args: vec!["--standalone".into()],
            ..PandocCfg::default()
        });

        let result = engine.convert(&input, &output);
        assert!(result.is_success(), "{:?}", result.error());
        assert_eq!(result.output_path(), Some(output.as_path()));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "# converted\n");

        let media_dir = dir.path().join("out").join("doc_media");
        assert_eq!(
            lines(&dir.path().join("argv")),
            vec![
                input.display().to_string(),
                "-t".into(),
                "gfm".into(),
                "-o".into(),
                output.display().to_string(),
                "--wrap=none".into(),
                format!("--extract-media={}", media_dir.display()),
                "--standalone".into(),
            ]
        );
        assert_eq!(
            result.warnings(),
            [format!("Media files extracted to: {}", media_dir.display())]
        );
    }

    #[test]
    fn pandoc_without_media_has_no_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_pandoc(dir.path(), false);
        let input = touch(dir.path(), "page.html");
        let output = dir.path().join("page.md");

        let result = pandoc_at(&exe.display().to_string()).convert(&input, &output);
        assert!(result.is_success());
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn pandoc_version_is_parsed_and_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_pandoc(dir.path(), false);
        let engine = pandoc_at(&exe.display().to_string());
        let calls = dir.path().join("version-calls");

        assert_eq!(engine.version().as_deref(), Some("3.1.11"));
        assert_eq!(engine.version().as_deref(), Some("3.1.11"));
        assert_eq!(lines(&calls).len(), 1);

        // availability is asked fresh every time
        assert!(engine.is_available());
        assert!(engine.is_available());
        assert_eq!(lines(&calls).len(), 3);
        assert_eq!(engine.info().version.as_deref(), Some("3.1.11"));
    }

    #[test]
    fn pandoc_timeout_becomes_failure() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(
            dir.path(),
            "pandoc",
            r#"if [ "$1" = "--version" ]; then echo "pandoc 3.0"; exit 0; fi
exec sleep 5
"#,
        );
        let input = touch(dir.path(), "slow.docx");
        let engine = PandocEngine::new(&PandocCfg {
            exe: exe.display().to_string(),
            timeout_seconds: 1,
            ..PandocCfg::default()
        });

        let result = engine.convert(&input, &dir.path().join("slow.md"));
        let message = result.error().unwrap().to_string();
        assert!(message.starts_with("Pandoc conversion failed"), "{message}");
        assert!(message.contains("exceeded timeout"), "{message}");
    }

    #[test]
    fn markitdown_warns_when_office_images_appear() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(
            dir.path(),
            "markitdown",
            r#"if [ "$1" = "--version" ]; then echo "markitdown 0.1.2"; exit 0; fi
printf '# Deck\n\n![chart](chart.png)\n' > "$3"
"#,
        );
        let engine = markitdown_at(&exe.display().to_string());
        assert_eq!(engine.version().as_deref(), Some("0.1.2"));

        let deck = touch(dir.path(), "deck.pptx");
        let result = engine.convert(&deck, &dir.path().join("md").join("deck.md"));
        assert!(result.is_success(), "{:?}", result.error());
        assert_eq!(result.warnings().len(), 1);
        assert!(result.warnings()[0].contains("may not extract embedded images"));

        // same output from a non-office input carries no warning
        let page = touch(dir.path(), "page.html");
        let result = engine.convert(&page, &dir.path().join("page.md"));
        assert!(result.is_success());
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn markitdown_nonzero_exit_is_failure_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(
            dir.path(),
            "markitdown",
            r#"if [ "$1" = "--version" ]; then echo "markitdown 0.1.2"; exit 0; fi
echo "cannot read input" >&2
exit 1
"#,
        );
        let input = touch(dir.path(), "broken.docx");

        let result = markitdown_at(&exe.display().to_string())
            .convert(&input, &dir.path().join("broken.md"));
        let message = result.error().unwrap().to_string();
        assert!(message.starts_with("MarkItDown conversion failed"), "{message}");
        assert!(message.contains("cannot read input"), "{message}");
    }
}
