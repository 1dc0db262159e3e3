use anyhow::Result;

use crate::{config, util::http};

/// 下載深交所清單，每行 `sz000001,平安银行`
pub async fn visit(listing: &config::Listing) -> Result<Vec<(String, String)>> {
    let text = http::get(&listing.szse_url, None).await?;

    Ok(parse_listing(&text))
}

/// 不是剛好兩欄的行直接略過
pub(crate) fn parse_listing(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let v: Vec<&str> = line.trim().split(',').collect();
            match v.as_slice() {
                [key, name] if !key.is_empty() => Some((key.to_string(), name.to_string())),
                _ => None,
            }
        })
        .collect()
}
