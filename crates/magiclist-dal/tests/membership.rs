use futures::TryStreamExt as _;
use magiclist_dal::{
    Error,
    block::{BlockRepositoryImpl, CreateBlock, SongPosition, UpdateBlock},
    membership::{BLOCK_SONGS, Position, REPERTOIRE_BLOCKS},
    repertoire::{BlockPosition, CreateRepertoire, RepertoireRepositoryImpl},
};
use sqlx::Executor;

const TEST_DATA: &str = r#"
INSERT INTO band (id, nome, genero) VALUES (1, 'Os Mutantes', 'rock');
INSERT INTO band (id, nome, genero) VALUES (2, 'Trio Forro', 'forro');

INSERT INTO song (id, band_id, titulo, artista, tom, bpm) VALUES (1, 1, 'Panis et Circenses', 'Os Mutantes', 'C', 110);
INSERT INTO song (id, band_id, titulo, artista, tom, bpm) VALUES (2, 1, 'A Minha Menina', 'Jorge Ben', 'E', 128);
INSERT INTO song (id, band_id, titulo, artista, tom, bpm) VALUES (3, 1, 'Baby', 'Caetano Veloso', 'G', 96);
INSERT INTO song (id, band_id, titulo, artista) VALUES (4, 2, 'Asa Branca', 'Luiz Gonzaga');

INSERT INTO block (id, band_id, nome) VALUES (1, 1, 'Abertura');
INSERT INTO block (id, band_id, nome) VALUES (2, 1, 'Baladas');

INSERT INTO block_song (block_id, song_id, ordem) VALUES (1, 1, 0);
INSERT INTO block_song (block_id, song_id, ordem) VALUES (1, 2, 1);
INSERT INTO block_song (block_id, song_id, ordem) VALUES (2, 3, 0);

INSERT INTO repertoire (id, band_id, nome, data) VALUES (1, 1, 'Festival', '2026-11-20');
INSERT INTO repertoire_block (repertoire_id, block_id, ordem) VALUES (1, 1, 0);
INSERT INTO repertoire_block (repertoire_id, block_id, ordem) VALUES (1, 2, 1);
"#;

async fn init_db() -> sqlx::Pool<sqlx::Sqlite> {
    const DB_URL: &str = "sqlite::memory:";
    let conn = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect(DB_URL)
        .await
        .unwrap();
    conn.execute("PRAGMA foreign_keys = ON").await.unwrap();
    magiclist_dal::MIGRATOR.run(&conn).await.unwrap();

    conn.execute_many(TEST_DATA)
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    conn
}

async fn block_positions(pool: &sqlx::Pool<sqlx::Sqlite>, block_id: i64) -> Vec<Position> {
    let mut conn = pool.acquire().await.unwrap();
    BLOCK_SONGS.positions(&mut conn, block_id).await.unwrap()
}

fn song_ids(block: &magiclist_dal::block::Block) -> Vec<i64> {
    block.songs.iter().map(|s| s.song_id).collect()
}

#[tokio::test]
async fn test_replace_reads_back_in_order() {
    let pool = init_db().await;
    let repo = BlockRepositoryImpl::new(pool.clone());

    let requested = vec![
        SongPosition { song_id: 3, ordem: 5 },
        SongPosition { song_id: 1, ordem: 0 },
        SongPosition { song_id: 2, ordem: 2 },
    ];
    let block = repo.replace_songs(1, &requested).await.unwrap();
    assert_eq!(song_ids(&block), vec![1, 2, 3]);
    assert_eq!(
        block.songs.iter().map(|s| s.ordem).collect::<Vec<_>>(),
        vec![0, 2, 5]
    );
    assert_eq!(block.songs[0].titulo, "Panis et Circenses");

    let stored = block_positions(&pool, 1).await;
    assert_eq!(
        stored,
        vec![Position::new(1, 0), Position::new(2, 2), Position::new(3, 5)]
    );
}

#[tokio::test]
async fn test_reverse_order() {
    let pool = init_db().await;
    let repo = BlockRepositoryImpl::new(pool);

    let block = repo.get(1).await.unwrap();
    assert_eq!(song_ids(&block), vec![1, 2]);

    let block = repo
        .replace_songs(
            1,
            &[
                SongPosition { song_id: 2, ordem: 0 },
                SongPosition { song_id: 1, ordem: 1 },
            ],
        )
        .await
        .unwrap();
    assert_eq!(song_ids(&block), vec![2, 1]);
    assert_eq!(song_ids(&repo.get(1).await.unwrap()), vec![2, 1]);
}

#[tokio::test]
async fn test_unknown_child_keeps_membership() {
    let pool = init_db().await;
    let repo = BlockRepositoryImpl::new(pool.clone());

    let err = repo
        .replace_songs(
            1,
            &[
                SongPosition { song_id: 3, ordem: 0 },
                SongPosition { song_id: 99, ordem: 1 },
                SongPosition { song_id: 98, ordem: 2 },
            ],
        )
        .await
        .unwrap_err();
    match err {
        Error::InvalidReferences { entity, ids } => {
            assert_eq!(entity, "song");
            assert_eq!(ids, vec![99, 98]);
        }
        other => panic!("Unexpected error {other:?}"),
    }

    assert_eq!(
        block_positions(&pool, 1).await,
        vec![Position::new(1, 0), Position::new(2, 1)]
    );
}

#[tokio::test]
async fn test_duplicate_ordinal_is_conflict_and_rolled_back() {
    let pool = init_db().await;
    let repo = BlockRepositoryImpl::new(pool.clone());

    let err = repo
        .replace_songs(
            1,
            &[
                SongPosition { song_id: 3, ordem: 0 },
                SongPosition { song_id: 2, ordem: 0 },
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err:?}");

    let err = repo
        .replace_songs(
            1,
            &[
                SongPosition { song_id: 3, ordem: 0 },
                SongPosition { song_id: 3, ordem: 1 },
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err:?}");

    assert_eq!(
        block_positions(&pool, 1).await,
        vec![Position::new(1, 0), Position::new(2, 1)]
    );
}

#[tokio::test]
async fn test_negative_ordinal_and_missing_parent() {
    let pool = init_db().await;
    let repo = BlockRepositoryImpl::new(pool.clone());

    let err = repo
        .replace_songs(1, &[SongPosition { song_id: 3, ordem: -1 }])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOrdinal(-1)));

    let err = repo
        .replace_songs(42, &[SongPosition { song_id: 3, ordem: 0 }])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RecordNotFound(_)));

    assert_eq!(block_positions(&pool, 1).await.len(), 2);
}

#[tokio::test]
async fn test_replace_with_empty_list() {
    let pool = init_db().await;
    let repo = BlockRepositoryImpl::new(pool.clone());

    let block = repo.replace_songs(1, &[]).await.unwrap();
    assert!(block.songs.is_empty());
    assert!(block_positions(&pool, 1).await.is_empty());
}

#[tokio::test]
async fn test_block_create_and_update_with_songs() {
    let pool = init_db().await;
    let repo = BlockRepositoryImpl::new(pool.clone());

    let block = repo
        .create(CreateBlock {
            band_id: 1,
            nome: "Bis".to_string(),
            descricao: Some("Encerramento".to_string()),
            songs: Some(vec![
                SongPosition { song_id: 2, ordem: 0 },
                SongPosition { song_id: 3, ordem: 1 },
            ]),
        })
        .await
        .unwrap();
    assert_eq!(song_ids(&block), vec![2, 3]);

    let updated = repo
        .update(
            block.id,
            UpdateBlock {
                nome: Some("Bis final".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.nome, "Bis final");
    assert_eq!(updated.descricao.as_deref(), Some("Encerramento"));
    assert_eq!(song_ids(&updated), vec![2, 3]);

    let err = repo
        .create(CreateBlock {
            band_id: 1,
            nome: "Quebrado".to_string(),
            descricao: None,
            songs: Some(vec![SongPosition { song_id: 77, ordem: 0 }]),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidReferences { .. }));
    assert_eq!(repo.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_deleted_block_leaves_repertoire() {
    let pool = init_db().await;
    let blocks = BlockRepositoryImpl::new(pool.clone());
    let repertoires = RepertoireRepositoryImpl::new(pool.clone());

    let before = repertoires.get(1).await.unwrap();
    assert_eq!(
        before.blocks.iter().map(|b| b.block_id).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(before.blocks[0].song_count, 2);

    blocks.delete(1).await.unwrap();

    let after = repertoires.blocks(1).await.unwrap();
    assert_eq!(after.iter().map(|b| b.block_id).collect::<Vec<_>>(), vec![2]);
    assert!(block_positions(&pool, 1).await.is_empty());

    let mut conn = pool.acquire().await.unwrap();
    let positions = REPERTOIRE_BLOCKS.positions(&mut conn, 1).await.unwrap();
    assert_eq!(positions, vec![Position::new(2, 1)]);
}

#[tokio::test]
async fn test_deleted_song_leaves_block() {
    let pool = init_db().await;
    let songs = magiclist_dal::song::SongRepositoryImpl::new(pool.clone());

    songs.delete(1).await.unwrap();
    assert_eq!(block_positions(&pool, 1).await, vec![Position::new(2, 1)]);
}

#[tokio::test]
async fn test_repertoire_blocks_and_setlist() {
    let pool = init_db().await;
    let repo = RepertoireRepositoryImpl::new(pool.clone());

    let setlist = repo.setlist(1).await.unwrap();
    assert_eq!(setlist.repertoire.nome, "Festival");
    assert_eq!(setlist.total_songs, 3);
    assert_eq!(
        setlist.blocks.iter().map(|b| b.nome.as_str()).collect::<Vec<_>>(),
        vec!["Abertura", "Baladas"]
    );

    let repertoire = repo
        .replace_blocks(
            1,
            &[
                BlockPosition { block_id: 2, ordem: 0 },
                BlockPosition { block_id: 1, ordem: 1 },
            ],
        )
        .await
        .unwrap();
    assert_eq!(
        repertoire.blocks.iter().map(|b| b.block_id).collect::<Vec<_>>(),
        vec![2, 1]
    );

    let setlist = repo.setlist(1).await.unwrap();
    let songs: Vec<i64> = setlist
        .blocks
        .iter()
        .flat_map(|b| b.songs.iter().map(|s| s.song_id))
        .collect();
    assert_eq!(songs, vec![3, 1, 2]);

    let err = repo
        .replace_blocks(1, &[BlockPosition { block_id: 9, ordem: 0 }])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidReferences { entity: "block", .. }));
    assert_eq!(repo.blocks(1).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_repertoire_create_with_empty_block() {
    let pool = init_db().await;
    let blocks = BlockRepositoryImpl::new(pool.clone());
    let repo = RepertoireRepositoryImpl::new(pool.clone());

    let empty = blocks
        .create(CreateBlock {
            band_id: 1,
            nome: "Vazio".to_string(),
            descricao: None,
            songs: None,
        })
        .await
        .unwrap();

    let repertoire = repo
        .create(CreateRepertoire {
            band_id: 1,
            nome: "Ensaio".to_string(),
            data: None,
            observacoes: None,
            blocks: Some(vec![
                BlockPosition { block_id: 2, ordem: 0 },
                BlockPosition { block_id: empty.id, ordem: 1 },
            ]),
        })
        .await
        .unwrap();

    let setlist = repo.setlist(repertoire.id).await.unwrap();
    assert_eq!(setlist.blocks.len(), 2);
    assert!(setlist.blocks[1].songs.is_empty());
    assert_eq!(setlist.total_songs, 1);
}

#[tokio::test]
async fn test_child_of_other_band_rejected() {
    let pool = init_db().await;
    let blocks = BlockRepositoryImpl::new(pool.clone());
    let repertoires = RepertoireRepositoryImpl::new(pool.clone());

    let err = blocks
        .replace_songs(
            1,
            &[
                SongPosition { song_id: 3, ordem: 0 },
                SongPosition { song_id: 4, ordem: 1 },
                SongPosition { song_id: 99, ordem: 2 },
            ],
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::InvalidReferences { entity: "song", ref ids } if ids == &vec![4, 99]),
        "got {err:?}"
    );
    assert_eq!(
        block_positions(&pool, 1).await,
        vec![Position::new(1, 0), Position::new(2, 1)]
    );

    let err = blocks
        .create(CreateBlock {
            band_id: 1,
            nome: "Forro".to_string(),
            descricao: None,
            songs: Some(vec![SongPosition { song_id: 4, ordem: 0 }]),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidReferences { entity: "song", .. }));
    assert_eq!(blocks.count().await.unwrap(), 2);

    let other = blocks
        .create(CreateBlock {
            band_id: 2,
            nome: "Xote".to_string(),
            descricao: None,
            songs: Some(vec![SongPosition { song_id: 4, ordem: 0 }]),
        })
        .await
        .unwrap();
    let err = repertoires
        .replace_blocks(1, &[BlockPosition { block_id: other.id, ordem: 0 }])
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::InvalidReferences { entity: "block", ref ids } if ids == &vec![other.id]),
        "got {err:?}"
    );
    assert_eq!(repertoires.blocks(1).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_large_unknown_list_reported() {
    let pool = init_db().await;
    let repo = BlockRepositoryImpl::new(pool.clone());

    let songs: Vec<SongPosition> = (0..40_000)
        .map(|i| SongPosition {
            song_id: 1000 + i,
            ordem: i,
        })
        .collect();
    let err = repo.replace_songs(1, &songs).await.unwrap_err();
    match err {
        Error::InvalidReferences { entity, ids } => {
            assert_eq!(entity, "song");
            assert_eq!(ids.len(), 40_000);
        }
        other => panic!("Unexpected error {other:?}"),
    }
    assert_eq!(block_positions(&pool, 1).await.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replace_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("concurrent.db").display());
    let pool = magiclist_dal::new_pool(&url).await.unwrap();
    pool.execute_many(TEST_DATA)
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    let orders = [[1, 2, 3], [3, 2, 1]];
    let mut tasks = Vec::new();
    for i in 0..20 {
        let repo = BlockRepositoryImpl::new(pool.clone());
        let songs: Vec<SongPosition> = orders[i % 2]
            .iter()
            .enumerate()
            .map(|(ordem, &song_id)| SongPosition {
                song_id,
                ordem: ordem as i64,
            })
            .collect();
        tasks.push(tokio::spawn(
            async move { repo.replace_songs(1, &songs).await },
        ));
    }
    for task in tasks {
        let block = task.await.unwrap().unwrap();
        assert_eq!(block.songs.len(), 3);
    }

    let stored: Vec<i64> = block_positions(&pool, 1)
        .await
        .into_iter()
        .map(|p| p.child_id)
        .collect();
    assert!(orders.iter().any(|o| o.as_slice() == stored.as_slice()));
}
