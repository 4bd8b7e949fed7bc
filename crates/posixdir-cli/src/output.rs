//! Text rendering for command results.

use posixdir_ldap::PosixAccount;

/// Renders accounts as `dn:` headers followed by indented `key: value` lines.
pub fn render_accounts(accounts: &[PosixAccount]) -> String {
    let mut out = String::new();
    for account in accounts {
        out.push_str(&format!("dn: {}\n", account.dn));
        for (key, value) in account.display_pairs() {
            out.push_str(&format!("  {key}: {value}\n"));
        }
    }
    out
}
