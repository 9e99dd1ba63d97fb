//! `concierge catalog`: list the tools offered to the model.

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Tool catalog");
    println!("============");
    for spec in concierge_tools::catalog() {
        println!();
        println!("  {}", spec.name);
        println!("    {}", spec.description);
        if let Some(params) = spec.parameters.as_object() {
            for (name, schema) in params {
                let required = if spec.required.contains(name) { " (required)" } else { "" };
                let description = schema["description"].as_str().unwrap_or_default();
                println!("    - {name}{required}: {description}");
            }
        }
        if let Some(param) = &spec.identity_param {
            println!("    {param} defaults to the customer's phone or email");
        }
        if !spec.identifier_prefixes.is_empty() {
            println!("    prefixes stripped: {}", spec.identifier_prefixes.join(", "));
        }
    }
    Ok(())
}
