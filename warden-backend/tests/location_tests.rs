use rstest::rstest;
use warden_backend::{is_windows_path, Location};

#[rstest]
#[case("web1:/srv/app", Some("web1"), None, "/srv/app")]
#[case("deploy@web1:~/app", Some("web1"), Some("deploy"), "~/app")]
#[case("deploy@10.0.0.4:projects/api", Some("10.0.0.4"), Some("deploy"), "projects/api")]
#[case("host.example.com:app", Some("host.example.com"), None, "app")]
#[case("/home/me/app", None, None, "/home/me/app")]
#[case("./app", None, None, "./app")]
#[case("~/app", None, None, "~/app")]
#[case("C:\\Users\\me\\app", None, None, "C:\\Users\\me\\app")]
#[case("d:/work/app", None, None, "d:/work/app")]
#[case("dir/with:colon", None, None, "dir/with:colon")]
#[case("trailing:", None, None, "trailing:")]
fn parses_location_grammar(
    #[case] input: &str,
    #[case] host: Option<&str>,
    #[case] user: Option<&str>,
    #[case] path: &str,
) {
    let loc = Location::parse(input);
    match (&loc, host) {
        (Location::Remote { host: h, user: u, path: p }, Some(expected_host)) => {
            assert_eq!(h, expected_host);
            assert_eq!(u.as_deref(), user);
            assert_eq!(p, path);
        }
        (Location::Local { path: p }, None) => assert_eq!(p, path),
        other => panic!("unexpected parse for {input}: {other:?}"),
    }
}

#[rstest]
#[case("C:\\x", true)]
#[case("c:/x", true)]
#[case("C:", true)]
#[case("CD:/x", false)]
#[case("/c:/x", false)]
fn detects_drive_letters(#[case] input: &str, #[case] expected: bool) {
    assert_eq!(is_windows_path(input), expected);
}
