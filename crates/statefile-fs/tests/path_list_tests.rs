use rstest::rstest;
use statefile_fs::{ErrorKind, PathListNormalizer, PathListStyle, munge};
use std::path::{Path, PathBuf};

fn windows() -> PathListNormalizer {
    PathListNormalizer::new(
        PathListStyle::Windows,
        "C:\\agent\\work",
        Some(PathBuf::from("C:\\Users\\agent")),
    )
}

fn posix() -> PathListNormalizer {
    PathListNormalizer::new(
        PathListStyle::Posix,
        "/var/lib/agent",
        Some(PathBuf::from("/home/agent")),
    )
}

#[test]
fn leaves_nil_as_nil() {
    assert_eq!(munge(None).unwrap(), None);
    assert_eq!(windows().munge(None).unwrap(), None);
    assert_eq!(posix().munge(None).unwrap(), None);
}

#[test]
fn expands_all_path_elements_for_this_host() {
    let separator = PathListStyle::host().separator();
    let value = format!("hello{separator}good/morning{separator}goodbye");

    let munged = munge(Some(&value)).unwrap().unwrap();

    let elements: Vec<_> = munged.split(separator).collect();
    assert_eq!(elements.len(), 3);
    for element in elements {
        assert!(Path::new(element).is_absolute(), "{element} is not absolute");
    }
    assert!(munged.contains("good/morning"));

    #[cfg(unix)]
    {
        let cwd = std::env::current_dir().unwrap();
        assert!(munged.starts_with(&format!("{}/hello", cwd.display())));
    }
}

#[rstest]
#[case("C:\\test\\directory", "C:/test/directory")]
#[case("//server/some/path", "//server/some/path")]
#[case("\\\\server\\some\\path", "//server/some/path")]
#[case("\\\\srv\\share", "//srv/share")]
#[case("c:/mixed\\slashes/..\\x", "c:/mixed/x")]
#[case("relative\\dir", "C:/agent/work/relative/dir")]
#[case("..\\sibling", "C:/agent/sibling")]
#[case("~", "C:/Users/agent")]
#[case("~\\AppData", "C:/Users/agent/AppData")]
#[case("C:modules", "C:/agent/work/modules")]
#[case("c:..\\site", "C:/agent/site")]
#[case("D:modules", "D:/modules")]
#[case("C:\\a;\\\\srv\\share;b", "C:/a;//srv/share;C:/agent/work/b")]
fn windows_style(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(windows().munge(Some(input)).unwrap().as_deref(), Some(expected));
}

#[rstest]
#[case("/etc/agent", "/etc/agent")]
#[case("modules", "/var/lib/agent/modules")]
#[case("./modules/../site", "/var/lib/agent/site")]
#[case("~/.agent", "/home/agent/.agent")]
#[case("~other", "/var/lib/agent/~other")]
#[case("/opt/a:lib:/usr//share/", "/opt/a:/var/lib/agent/lib:/usr/share")]
#[case("odd\\name", "/var/lib/agent/odd\\name")]
fn posix_style(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(posix().munge(Some(input)).unwrap().as_deref(), Some(expected));
}

#[rstest]
#[case("")]
#[case(":/a")]
#[case("/a:")]
#[case("/a::/b")]
#[case("/a\0b")]
fn malformed_lists_are_invalid(#[case] input: &str) {
    let err = posix().munge(Some(input)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument, "input {input:?}");
}

#[test]
fn windows_separator_is_semicolon() {
    assert_eq!(PathListStyle::Windows.separator(), ';');
    assert_eq!(PathListStyle::Posix.separator(), ':');
    // a colon is part of a drive, not a separator
    assert_eq!(
        windows().munge(Some("D:\\x")).unwrap().as_deref(),
        Some("D:/x")
    );
}
