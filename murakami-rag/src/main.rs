fn main() -> anyhow::Result<()> {
    murakami_rag_lib::run()
}
