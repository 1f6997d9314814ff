use anyhow::Result;
use magiclist_dal::{band::Band, block::Block, song::Song};
use reqwest::Url;
use serde_json::{Value, json};
use tracing::info;

async fn create<T>(client: &reqwest::Client, base_url: &Url, path: &str, payload: &Value) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let api_url = base_url.join(path)?;

    let response = client.post(api_url).json(payload).send().await?;
    info!("Response: {:#?}", response);
    assert!(response.status().is_success());
    assert!(response.status().as_u16() == 201);

    let record: T = response.json().await?;
    Ok(record)
}

pub async fn create_band(client: &reqwest::Client, base_url: &Url, nome: &str) -> Result<Band> {
    create(client, base_url, "api/band", &json!({"nome": nome, "genero": "rock"})).await
}

pub async fn create_song(
    client: &reqwest::Client,
    base_url: &Url,
    band_id: i64,
    titulo: &str,
) -> Result<Song> {
    let payload = json!({"band_id": band_id, "titulo": titulo, "bpm": 120});
    create(client, base_url, "api/song", &payload).await
}

pub async fn create_block(
    client: &reqwest::Client,
    base_url: &Url,
    band_id: i64,
    nome: &str,
    song_ids: &[i64],
) -> Result<Block> {
    let songs: Vec<Value> = song_ids
        .iter()
        .enumerate()
        .map(|(ordem, song_id)| json!({"song_id": song_id, "ordem": ordem}))
        .collect();
    let payload = json!({"band_id": band_id, "nome": nome, "songs": songs});
    create(client, base_url, "api/block", &payload).await
}
