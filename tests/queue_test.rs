//! Scheduling-order properties of the task queue

use proptest::prelude::*;

use fetchq::models::TaskStatus;
use fetchq::queue::TaskQueue;

#[test]
fn test_priority_scenario_one_five_three() {
    let mut queue = TaskQueue::new();
    queue.enqueue("https://example.com/a", 1);
    queue.enqueue("https://example.com/b", 5);
    queue.enqueue("https://example.com/c", 3);

    let order: Vec<i32> = (0..3)
        .map(|_| queue.dequeue("w1").unwrap().priority)
        .collect();
    assert_eq!(order, vec![5, 3, 1]);
}

#[test]
fn test_every_submitted_task_reaches_one_terminal_state() {
    let mut queue = TaskQueue::new();

    let mut ids = Vec::new();
    for i in 0..10 {
        ids.push(queue.enqueue(format!("https://example.com/{i}"), i));
    }
    for _ in 0..10 {
        queue.dequeue("w1").unwrap();
    }

    for (i, id) in ids.iter().enumerate() {
        if i % 2 == 0 {
            queue.complete(id, Some(serde_json::json!({"n": i})), None).unwrap();
        } else {
            queue.complete(id, None, Some("fetch failed".into())).unwrap();
        }
    }

    for id in &ids {
        let task = queue.terminal_task(id).unwrap();
        // Exactly one terminal state, and completed_at set iff terminal.
        assert!(task.status.is_terminal());
        assert!(task.completed_at.is_some());
        match task.status {
            TaskStatus::Completed => {
                assert!(task.result.is_some());
                assert!(task.error.is_none());
            }
            TaskStatus::Failed => {
                assert!(task.result.is_none());
                assert!(task.error.is_some());
            }
            other => panic!("non-terminal status {other}"),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Dequeue order is non-increasing in priority for any enqueue sequence
    #[test]
    fn prop_dequeue_priorities_non_increasing(priorities in prop::collection::vec(-50i32..50, 0..40)) {
        let mut queue = TaskQueue::new();
        for (i, p) in priorities.iter().enumerate() {
            queue.enqueue(format!("https://example.com/{i}"), *p);
        }

        let mut dequeued = Vec::new();
        while let Some(snapshot) = queue.dequeue("w") {
            dequeued.push(snapshot.priority);
        }

        prop_assert_eq!(dequeued.len(), priorities.len());
        for pair in dequeued.windows(2) {
            prop_assert!(pair[0] >= pair[1]);
        }
    }

    /// Equal-priority tasks come out in their original insertion order
    #[test]
    fn prop_equal_priority_fifo(count in 1usize..30) {
        let mut queue = TaskQueue::new();
        let ids: Vec<String> = (0..count)
            .map(|i| queue.enqueue(format!("https://example.com/{i}"), 7))
            .collect();

        let dequeued: Vec<String> = (0..count)
            .map(|_| queue.dequeue("w").unwrap().id)
            .collect();

        prop_assert_eq!(dequeued, ids);
    }

    /// No id is ever handed out twice, whatever the interleaving
    #[test]
    fn prop_single_ownership(priorities in prop::collection::vec(0i32..5, 1..25)) {
        let mut queue = TaskQueue::new();
        for (i, p) in priorities.iter().enumerate() {
            queue.enqueue(format!("https://example.com/{i}"), *p);
        }

        let mut seen = std::collections::HashSet::new();
        while let Some(snapshot) = queue.dequeue("w") {
            prop_assert!(seen.insert(snapshot.id));
        }
        prop_assert!(queue.dequeue("w").is_none());
    }
}
