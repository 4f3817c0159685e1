use std::io::Write;
use titlesep_core::{
    is_titled_player, ConfigError, ConfigManager, GameRecord, PlayerRecord, Title, TitleSet,
};

fn player(json: &str) -> PlayerRecord {
    serde_json::from_str(json).unwrap()
}

#[test]
fn multi_title_string_matches_exact_set() {
    let gm = TitleSet::new([Title::GM]);
    let im_gm = player(r#"{"full_name":"Doe, John","title":"IM/GM","rating":2450}"#);
    let wgm = player(r#"{"full_name":"Roe, Jane","title":"WGM","rating":"2300"}"#);

    assert!(is_titled_player(Some(&im_gm), &gm, true));
    assert!(!is_titled_player(Some(&wgm), &gm, true));
    assert!(is_titled_player(Some(&wgm), &gm, false));
    assert!(!is_titled_player(None, &TitleSet::all(), false));
}

#[test]
fn irregular_payload_values_are_tolerated() {
    let record = player(
        r#"{"full_name":"Smith, A","title":null,"rating":"n/a","standard_rating":1985}"#,
    );
    assert_eq!(record.title, "");
    assert_eq!(record.rating, None);
    assert_eq!(record.standard_rating, Some(1985.0));

    let game: GameRecord = serde_json::from_str(
        r#"{"score":"1","opponent_ecf_code":null,"opponent_no":"48213","colour":"B"}"#,
    )
    .unwrap();
    assert!(game.is_win());
    assert_eq!(game.opponent_identity(), Some("48213"));
}

#[test]
fn title_list_from_command_line() {
    let set = TitleSet::parse_list("im, gm").unwrap();
    assert_eq!(set.cache_key(), "GM,IM");
    assert!(TitleSet::parse_list("").unwrap().is_all());
    assert!(TitleSet::parse_list("GM,XYZ").is_err());
}

#[test]
fn explicit_config_file_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[network]
api_base = "http://localhost:9000/api.php"
max_attempts = 2

[[network.endpoints]]
name = "local"
kind = "direct"
base = "http://localhost:9000/api.php"
health_check_path = "/"

[[network.endpoints]]
name = "proxy"
kind = "relay"
base = "http://localhost:9001/?url="
"#
    )
    .unwrap();

    let manager = ConfigManager::load(Some(file.path())).unwrap();
    assert_eq!(manager.config_path(), Some(file.path()));
    let network = &manager.config().network;
    assert_eq!(network.endpoints.len(), 2);
    assert_eq!(network.endpoints[1].name, "proxy");
    assert_eq!(network.request_timeout_secs, 30);
}

#[test]
fn missing_explicit_config_is_an_error() {
    let err = ConfigManager::load(Some(std::path::Path::new("/nonexistent/titlesep.toml")))
        .unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}
