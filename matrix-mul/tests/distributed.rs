use matrix_mul::{
    Error, LocalOperands, Matrix, OriginRole, WorkerRole, multiply, receive_operands, row_range,
    submit_result,
};
use message_passing::{Communicator, Element, LocalCommunicator, Tag, local_cluster};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;

fn m(rows: &[&[Element]]) -> Matrix {
    Matrix::from_rows(rows.iter().map(|r| r.to_vec()).collect())
}

fn spawn_workers(
    ranks: impl Iterator<Item = LocalCommunicator>,
) -> Vec<JoinHandle<Result<usize, Error>>> {
    ranks
        .map(|comm| tokio::spawn(async move { WorkerRole::new(&comm)?.serve().await }))
        .collect()
}

async fn distributed_product(a: Matrix, b: Matrix, p: usize) -> Matrix {
    let mut ranks = local_cluster(p).into_iter();
    let origin = ranks.next().unwrap();
    let workers = spawn_workers(ranks);

    let result = OriginRole::new(&origin).unwrap().multiply(a, b).await.unwrap();
    for worker in workers {
        worker.await.unwrap().unwrap();
    }
    result
}

#[tokio::test]
async fn two_by_two_over_two_ranks() {
    let a = m(&[&[1, 2], &[3, 4]]);
    let b = m(&[&[5, 6], &[7, 8]]);

    let c = distributed_product(a, b, 2).await;
    assert_eq!(c, m(&[&[19, 22], &[43, 50]]));
}

#[tokio::test]
async fn single_rank_needs_no_peers() {
    let a = m(&[&[1, 2], &[3, 4]]);
    let b = m(&[&[5, 6], &[7, 8]]);

    let c = distributed_product(a.clone(), b.clone(), 1).await;
    assert_eq!(c, multiply(&a, &b));
}

#[tokio::test]
async fn more_ranks_than_rows() {
    let a = Matrix::from_fn(3, |i, j| (i * 3 + j) as Element);
    let b = Matrix::from_fn(3, |i, j| (i + 2 * j) as Element - 1);
    let expected = multiply(&a, &b);

    let mut ranks = local_cluster(5).into_iter();
    let origin = ranks.next().unwrap();
    let workers: Vec<_> = ranks
        .map(|comm| {
            tokio::spawn(async move {
                let operands = receive_operands(&comm).await?;
                let partial = operands.multiply();
                submit_result(&comm, &partial).await?;
                Ok::<_, Error>((comm.rank(), operands.range))
            })
        })
        .collect();

    let c = OriginRole::new(&origin).unwrap().multiply(a, b).await.unwrap();
    assert_eq!(c, expected);

    for worker in workers {
        let (rank, range) = worker.await.unwrap().unwrap();
        if rank < 3 {
            assert_eq!(range.len(), 1, "rank {rank}");
        } else {
            assert!(range.is_empty(), "rank {rank} should own nothing");
        }
    }
}

#[tokio::test]
async fn empty_problem_broadcasts_only_the_size() {
    let mut ranks = local_cluster(3).into_iter();
    let origin = ranks.next().unwrap();
    let workers = spawn_workers(ranks);

    let c = OriginRole::new(&origin)
        .unwrap()
        .multiply(Matrix::zeros(0), Matrix::zeros(0))
        .await
        .unwrap();
    assert_eq!(c, Matrix::zeros(0));

    for worker in workers {
        assert_eq!(worker.await.unwrap().unwrap(), 0);
    }
}

#[tokio::test]
async fn empty_problem_sends_nothing_after_the_size() {
    let mut ranks = local_cluster(2).into_iter();
    let origin = ranks.next().unwrap();
    let worker = ranks.next().unwrap();

    let own = matrix_mul::scatter_operands(&origin, &Matrix::zeros(0), Matrix::zeros(0))
        .await
        .unwrap();
    assert_eq!(own.n, 0);
    drop(origin);

    assert_eq!(receive_operands(&worker).await.unwrap().n, 0);
    // A zero-length B broadcast would still be queued here.
    let next = worker.receive(&mut [], 0, Tag::Broadcast).await;
    assert!(
        matches!(next, Err(message_passing::Error::ConnectionClosed(0))),
        "unexpected frame after the size: {next:?}"
    );
}

#[tokio::test]
async fn workers_receive_exactly_their_rows() {
    let n = 7;
    let p = 3;
    let a = Matrix::from_fn(n, |i, j| (i * 100 + j) as Element);
    let b = Matrix::from_fn(n, |i, j| (i * j) as Element);

    let mut ranks = local_cluster(p).into_iter();
    let origin = ranks.next().unwrap();
    let workers: Vec<JoinHandle<Result<LocalOperands, Error>>> = ranks
        .map(|comm| tokio::spawn(async move { receive_operands(&comm).await }))
        .collect();

    let own = matrix_mul::scatter_operands(&origin, &a, b.clone()).await.unwrap();
    assert_eq!(own.range, row_range(n, p, 0));
    assert_eq!(own.a_rows, a.rows_in(own.range));

    for (rank, worker) in (1..p).zip(workers) {
        let operands = worker.await.unwrap().unwrap();
        assert_eq!(operands.n, n);
        assert_eq!(operands.range, row_range(n, p, rank));
        assert_eq!(operands.a_rows, a.rows_in(operands.range));
        assert_eq!(operands.b, b);
    }
}

#[tokio::test]
async fn mismatched_operands_are_rejected() {
    let origin = local_cluster(1).pop().unwrap();
    let err = OriginRole::new(&origin)
        .unwrap()
        .multiply(Matrix::zeros(2), Matrix::zeros(3))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch(2, 3)));
}

#[tokio::test]
async fn short_broadcast_of_b_is_fatal_at_worker() {
    let mut ranks = local_cluster(2);
    let worker = ranks.pop().unwrap();
    let origin = ranks.pop().unwrap();

    origin.broadcast(&mut [3], 0).await.unwrap();
    origin.broadcast(&mut [0; 4], 0).await.unwrap();

    let err = receive_operands(&worker).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Comm(message_passing::Error::SizeMismatch {
            expected: 9,
            actual: 4,
            ..
        })
    ));
}

#[tokio::test]
async fn negative_size_is_fatal_at_worker() {
    let mut ranks = local_cluster(2);
    let worker = ranks.pop().unwrap();
    let origin = ranks.pop().unwrap();

    origin.broadcast(&mut [-1], 0).await.unwrap();
    assert!(matches!(
        receive_operands(&worker).await,
        Err(Error::InvalidSize(-1))
    ));
}

#[tokio::test]
async fn roles_are_bound_to_ranks() {
    let mut ranks = local_cluster(2);
    let worker = ranks.pop().unwrap();
    let origin = ranks.pop().unwrap();

    assert!(matches!(
        OriginRole::new(&worker),
        Err(Error::WrongRole { role: "origin", rank: 1 })
    ));
    assert!(matches!(
        WorkerRole::new(&origin),
        Err(Error::WrongRole { role: "worker", rank: 0 })
    ));
}

#[tokio::test]
async fn worker_fails_when_origin_goes_away() {
    let mut ranks = local_cluster(2);
    let worker = ranks.pop().unwrap();
    drop(ranks);

    let err = WorkerRole::new(&worker).unwrap().serve().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Comm(message_passing::Error::ConnectionClosed(0))
    ));
}

fn random_matrix(n: usize, seed: u64) -> Matrix {
    let mut rng = StdRng::seed_from_u64(seed);
    Matrix::from_fn(n, |_, _| rng.gen_range(-50..50))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn distributed_equals_sequential(n in 0usize..12, p in 1usize..9, seed in any::<u64>()) {
        let a = random_matrix(n, seed);
        let b = random_matrix(n, seed.wrapping_add(1));
        let expected = multiply(&a, &b);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let c = runtime.block_on(distributed_product(a, b, p));

        prop_assert_eq!(c, expected);
    }
}
