use backpack_common::EnvVars;

pub struct ApiServerEnv {
    pub secret_salt: String,
    pub audience: String,
}

impl EnvVars for ApiServerEnv {
    fn load() -> Self {
        Self {
            secret_salt: std::env::var("SECRET_SALT").unwrap(),
            audience: std::env::var("AUDIENCE").unwrap(),
        }
    }

    fn get_env_var(&self, key: &str) -> String {
        match key {
            "SECRET_SALT" => self.secret_salt.clone(),
            "AUDIENCE" => self.audience.clone(),
            _ => panic!("{} is not set", key),
        }
    }
}
