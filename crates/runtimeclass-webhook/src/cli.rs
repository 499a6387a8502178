use clap::builder::PossibleValue;
use clap::{crate_description, crate_name, crate_version, Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    let mut args = vec![
        Arg::new("log-level")
            .long("log-level")
            .value_name("LOG_LEVEL")
            .env("RUNTIMECLASS_WEBHOOK_LOG_LEVEL")
            .default_value("info")
            .value_parser([
                PossibleValue::new("trace"),
                PossibleValue::new("debug"),
                PossibleValue::new("info"),
                PossibleValue::new("warn"),
                PossibleValue::new("error"),
            ])
            .help("Log level"),
        Arg::new("log-fmt")
            .long("log-fmt")
            .value_name("LOG_FMT")
            .env("RUNTIMECLASS_WEBHOOK_LOG_FMT")
            .default_value("text")
            .value_parser([PossibleValue::new("text"), PossibleValue::new("json")])
            .help("Log output format"),
        Arg::new("log-no-color")
            .long("log-no-color")
            .env("NO_COLOR")
            .action(ArgAction::SetTrue)
            .help("Disable colored output for logs"),
        Arg::new("address")
            .long("addr")
            .value_name("BIND_ADDRESS")
            .default_value("0.0.0.0")
            .env("RUNTIMECLASS_WEBHOOK_BIND_ADDRESS")
            .help("Bind against ADDRESS"),
        Arg::new("port")
            .long("port")
            .value_name("PORT")
            .default_value("8443")
            .env("RUNTIMECLASS_WEBHOOK_PORT")
            .help("Listen on PORT"),
        Arg::new("cert-file")
            .long("cert-file")
            .value_name("CERT_FILE")
            .default_value("/certs/tls.crt")
            .env("RUNTIMECLASS_WEBHOOK_CERT_FILE")
            .help("Path to an X.509 certificate file for HTTPS. Serve plain HTTP when empty"),
        Arg::new("key-file")
            .long("key-file")
            .value_name("KEY_FILE")
            .default_value("/certs/tls.key")
            .env("RUNTIMECLASS_WEBHOOK_KEY_FILE")
            .help("Path to an X.509 private key file for HTTPS. Serve plain HTTP when empty"),
        Arg::new("namespace-lookup-timeout")
            .long("namespace-lookup-timeout")
            .value_name("SECONDS")
            .default_value("2")
            .env("RUNTIMECLASS_WEBHOOK_NAMESPACE_LOOKUP_TIMEOUT")
            .value_parser(clap::value_parser!(u64).range(1..))
            .help("Give up fetching the namespace of a workload after the given time"),
        Arg::new("ignore-kubernetes-connection-failure")
            .long("ignore-kubernetes-connection-failure")
            .env("RUNTIMECLASS_WEBHOOK_IGNORE_KUBERNETES_CONNECTION_FAILURE")
            .action(ArgAction::SetTrue)
            .help("Do not exit with an error if the Kubernetes client cannot be created. No workload will be mutated until the webhook is restarted."),
    ];
    args.sort_by(|a, b| a.get_id().cmp(b.get_id()));

    Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .args(args)
}
