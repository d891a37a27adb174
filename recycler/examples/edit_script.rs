// Example: diff two plain slices and replay the edit script.
use recycler::diff_slices_by;

fn main() {
    // Example: rows keyed by their first letter; content is the whole word.
    let old = vec!["apple", "banana", "cherry", "date", "elder"];
    let new = vec!["date", "apple", "blueberry", "cherry", "fig"];

    let same_key = |a: &&str, b: &&str| a.as_bytes().first() == b.as_bytes().first();
    let same_word = |a: &&str, b: &&str| a == b;

    for detect_moves in [false, true] {
        let script = diff_slices_by(&old, &new, detect_moves, same_key, same_word);
        println!("detect_moves={detect_moves}: {} ops", script.len());
        for op in script.iter() {
            println!("  {op:?}");
        }

        let mut replayed = old.clone();
        script.apply(&mut replayed, &new);
        println!("  replayed: {replayed:?}");
    }
}
