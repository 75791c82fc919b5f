//! `ledgercal companies`: the records anniversaries are derived from.

use std::fmt::Write as _;

use ledgercal_core::{Company, CompanyDirectory};

use super::{Context, print_json};
use crate::cli::CompaniesAction;
use crate::error::{ClientError, ClientResult};

pub fn run(ctx: &Context, action: CompaniesAction) -> ClientResult<()> {
    let store = ctx.open_store()?;
    match action {
        CompaniesAction::Add { name, registered } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(ClientError::invalid_argument("company name must not be empty"));
            }
            let company = store.insert_company(name, registered)?;
            println!("added company #{}: {}", company.id, company.name);
            Ok(())
        }
        CompaniesAction::List { json } => {
            let companies = store.list_companies()?;
            if json {
                print_json(&companies)
            } else {
                print!("{}", render(&companies));
                Ok(())
            }
        }
    }
}

pub fn render(companies: &[Company]) -> String {
    let mut out = String::new();
    for company in companies {
        let registered = company
            .registration_date
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        let _ = writeln!(out, "#{:<5} {:<10} {}", company.id, registered, company.name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ledgercal_store::SqliteStore;

    #[test]
    fn render_lists_registration_dates() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_company("Acme Ltd", NaiveDate::from_ymd_opt(2020, 3, 1))
            .unwrap();
        store.insert_company("No Date Co", None).unwrap();

        let text = render(&store.list_companies().unwrap());
        assert_eq!(
            text,
            "#1     2020-03-01 Acme Ltd\n#2     -          No Date Co\n"
        );
    }
}
