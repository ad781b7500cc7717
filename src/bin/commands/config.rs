use erdb::ErdbConfig;

pub fn run(config: &ErdbConfig) {
    println!("Config File:        {}", ErdbConfig::config_file_path());
    println!("{}", config.summary());
}
