use advstate_core::{BindingOptions, Location, scope};

pub fn resolve(
    url: &str,
    prefix: &str,
    query_param: Option<String>,
    path_pattern: Option<String>,
    key: &str,
) -> anyhow::Result<()> {
    let location = Location::parse(url)?;
    let options = BindingOptions {
        scope_by_query_param: query_param,
        scope_by_path_pattern: path_pattern,
        ..BindingOptions::default()
    };
    let resolved = options.resolve(key);
    println!("{}", scope::resolve(prefix, &resolved.scope, key, &location));
    Ok(())
}
