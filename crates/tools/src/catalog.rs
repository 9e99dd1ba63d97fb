//! The static tool catalog shared by every channel.

use std::sync::LazyLock;

use concierge_core::provider::ToolDefinition;
use concierge_core::tool::ToolSpec;

pub const GET_ORDER_STATUS: &str = "get_order_status";
pub const GET_QUOTE: &str = "get_quote";
pub const GET_INVOICE: &str = "get_invoice";
pub const SEARCH_KNOWLEDGE_BASE: &str = "search_knowledge_base";
pub const ESCALATE_TO_HUMAN: &str = "escalate_to_human";

/// Tools answered by the external record service.
pub const LOOKUP_TOOLS: [&str; 4] = [GET_ORDER_STATUS, GET_QUOTE, GET_INVOICE, SEARCH_KNOWLEDGE_BASE];

static CATALOG: LazyLock<Vec<ToolSpec>> = LazyLock::new(|| {
    vec![
        ToolSpec::new(
            GET_ORDER_STATUS,
            "Look up the status of a customer's order. If the customer did not give an \
             order number, omit it and the customer's own account is used.",
        )
        .param("order_number", "Order number, if the customer gave one", false)
        .identity_optional("order_number", &["ORD-"]),
        ToolSpec::new(
            GET_QUOTE,
            "Look up a quote: items, totals, validity. Also resolves the quote document \
             so it can be sent when the customer asks for it. Omit the quote number to \
             use the customer's most recent quote.",
        )
        .param("quote_number", "Quote number, if the customer gave one", false)
        .identity_optional("quote_number", &["QUO-", "QT-"]),
        ToolSpec::new(
            GET_INVOICE,
            "Look up an invoice: amount due, due date, payment and delivery status. Also \
             resolves the invoice document. Omit the invoice number to use the customer's \
             most recent invoice.",
        )
        .param("invoice_number", "Invoice number, if the customer gave one", false)
        .identity_optional("invoice_number", &["INV-"]),
        ToolSpec::new(
            SEARCH_KNOWLEDGE_BASE,
            "Search product documentation and policies (shipping, returns, warranty).",
        )
        .param("query", "What to search for", true),
        ToolSpec::new(
            ESCALATE_TO_HUMAN,
            "Hand the conversation to a human on the support team. Use when the customer \
             asks for a person, is upset, or the request is outside what the tools can do.",
        )
        .param("reason", "Why a human is needed", true)
        .param("summary", "Short summary of the conversation so far", true),
    ]
});

/// Every tool specification, in a fixed order. Identical for all channels.
pub fn catalog() -> &'static [ToolSpec] {
    &CATALOG
}

/// Look up a specification by exact name.
pub fn find(name: &str) -> Option<&'static ToolSpec> {
    CATALOG.iter().find(|s| s.name == name)
}

/// The catalog in the shape sent to the model.
pub fn definitions() -> Vec<ToolDefinition> {
    CATALOG.iter().map(ToolSpec::to_definition).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = catalog().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), catalog().len());
    }

    #[test]
    fn catalog_is_stable() {
        assert!(std::ptr::eq(catalog(), catalog()));
        assert_eq!(definitions().len(), 5);
    }

    #[test]
    fn document_tools_are_identity_optional() {
        let invoice = find(GET_INVOICE).unwrap();
        assert_eq!(invoice.identity_param.as_deref(), Some("invoice_number"));
        assert_eq!(invoice.identifier_prefixes, vec!["INV-"]);
        assert!(invoice.required.is_empty());

        let quote = find(GET_QUOTE).unwrap();
        assert_eq!(quote.identifier_prefixes, vec!["QUO-", "QT-"]);
    }

    #[test]
    fn escalation_requires_reason_and_summary() {
        let spec = find(ESCALATE_TO_HUMAN).unwrap();
        assert_eq!(spec.required, vec!["reason", "summary"]);
        assert!(spec.identity_param.is_none());
    }

    #[test]
    fn unknown_name_is_none() {
        assert!(find("delete_everything").is_none());
    }
}
