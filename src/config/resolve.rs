fn cli_arg(flag: &str) -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}

pub fn resolve_string(flag: &str, env: &str, default: &str) -> String {
    if let Some(value) = cli_arg(flag) {
        return value;
    }
    if let Ok(value) = std::env::var(env) {
        return value;
    }
    default.to_string()
}

pub fn resolve_usize(flag: &str, env: &str, default: usize) -> usize {
    if let Some(value) = cli_arg(flag) {
        if let Ok(v) = value.parse::<usize>() {
            return v;
        }
    }
    if let Ok(value) = std::env::var(env) {
        if let Ok(v) = value.parse::<usize>() {
            return v;
        }
    }
    default
}

pub fn resolve_u64(flag: &str, env: &str, default: u64) -> u64 {
    if let Some(value) = cli_arg(flag) {
        if let Ok(v) = value.parse::<u64>() {
            return v;
        }
    }
    if let Ok(value) = std::env::var(env) {
        if let Ok(v) = value.parse::<u64>() {
            return v;
        }
    }
    default
}

pub fn resolve_bool(flag: &str, env: &str, default: bool) -> bool {
    if let Some(value) = cli_arg(flag) {
        if let Ok(v) = value.parse::<bool>() {
            return v;
        }
    }
    if let Ok(value) = std::env::var(env) {
        if let Ok(v) = value.parse::<bool>() {
            return v;
        }
    }
    default
}
