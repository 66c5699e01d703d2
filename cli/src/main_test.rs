use super::*;

#[test]
fn flags_take_precedence_in_client_config() {
    let cli = Cli::parse_from([
        "gx",
        "--endpoint",
        "http://flag.test/",
        "--client-id",
        "flag-cli",
        "--storage-key",
        "flag_auth",
        "--timeout-secs",
        "7",
        "whoami",
    ]);
    let config = ClientConfig::from_lookup(settings(&cli)).unwrap();

    assert_eq!(config.endpoint, "http://flag.test");
    assert_eq!(config.client_id, "flag-cli");
    assert_eq!(config.storage_key, "flag_auth");
    assert_eq!(config.timeouts.request_secs, Some(7));
}

#[test]
fn unset_flags_defer_to_lookup_chain() {
    let cli = Cli::parse_from(["gx", "whoami"]);
    let lookup = settings(&cli);

    let endpoint = lookup("GX_ENDPOINT").unwrap();
    assert!(!endpoint.is_empty());
    assert!(lookup("GX_CLIENT_ID").is_some());
}
