#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear_env() {
        for var in [
            "MAILBROKER_BIND_ADDRESS",
            "MAILBROKER_PORT",
            "MAILBROKER_HOSTNAME",
            "MAILBROKER_DATA_SIZE_LIMIT",
            "MAILBROKER_ENABLE_SMTPUTF8",
            "MAILBROKER_DECODE_DATA",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn from_env_reads_overrides() {
        clear_env();
        env::set_var("MAILBROKER_BIND_ADDRESS", "127.0.0.1");
        env::set_var("MAILBROKER_PORT", "2526");
        env::set_var("MAILBROKER_HOSTNAME", "mail.example.org");
        env::set_var("MAILBROKER_DATA_SIZE_LIMIT", "1024");

        let config = Config::from_env().expect("config should load");

        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 2526);
        assert_eq!(config.hostname, "mail.example.org");
        assert_eq!(config.data_size_limit, 1024);
        assert!(!config.enable_smtputf8);
        assert!(!config.decode_data);

        clear_env();
    }

    #[test]
    fn from_env_applies_defaults() {
        clear_env();

        let config = Config::from_env().expect("config should load");

        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 2525);
        assert_eq!(config.data_size_limit, DATA_SIZE_LIMIT_DEFAULT);
        assert_eq!(config.command_size_limit, COMMAND_SIZE_LIMIT);

        clear_env();
    }

    #[test]
    fn from_env_rejects_invalid_port() {
        clear_env();
        env::set_var("MAILBROKER_PORT", "not-a-port");

        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    fn from_env_rejects_utf8_and_decode_data_together() {
        clear_env();
        env::set_var("MAILBROKER_ENABLE_SMTPUTF8", "true");
        env::set_var("MAILBROKER_DECODE_DATA", "true");

        assert!(Config::from_env().is_err());

        clear_env();
    }
}
